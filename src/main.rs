fn main() -> anyhow::Result<()> {
    history_sidebar::run()
}
