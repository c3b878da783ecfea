use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use anyhow::{Result, anyhow};
use tracing::{debug, info};

use crate::gateway::{GatewayError, HistoryApi};
use crate::model::{Folder, HistoryItem};

/// Work the UI hands to the gateway thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Folders and history for the sidebar tree.
    Reload,
    /// History for the search overlay's session cache.
    LoadSearchHistory,
    MoveItem {
        item_id: i64,
        folder_id: Option<i64>,
    },
    DeleteItem {
        item_id: i64,
    },
    ClearHistory,
    CreateFolder {
        name: String,
        color: String,
    },
    DeleteFolder {
        folder_id: i64,
    },
}

#[derive(Debug)]
pub enum Completion {
    Reloaded(Result<(Vec<Folder>, Vec<HistoryItem>), GatewayError>),
    SearchHistory(Result<Vec<HistoryItem>, GatewayError>),
    Mutated {
        request: Request,
        result: Result<(), GatewayError>,
    },
}

pub fn execute(api: &dyn HistoryApi, request: Request) -> Completion {
    match request {
        Request::Reload => Completion::Reloaded(
            api.list_folders()
                .and_then(|folders| api.list_history().map(|items| (folders, items))),
        ),
        Request::LoadSearchHistory => Completion::SearchHistory(api.list_history()),
        Request::MoveItem { item_id, folder_id } => Completion::Mutated {
            result: api.move_item(item_id, folder_id),
            request,
        },
        Request::DeleteItem { item_id } => Completion::Mutated {
            result: api.delete_item(item_id),
            request,
        },
        Request::ClearHistory => Completion::Mutated {
            result: api.clear_history(),
            request,
        },
        Request::CreateFolder { ref name, ref color } => {
            let result = create_folder_checked(api, name, color);
            Completion::Mutated { request, result }
        }
        Request::DeleteFolder { folder_id } => Completion::Mutated {
            result: api.delete_folder(folder_id),
            request,
        },
    }
}

/// Rejects a case-insensitive duplicate before asking the server to create.
fn create_folder_checked(api: &dyn HistoryApi, name: &str, color: &str) -> Result<(), GatewayError> {
    let existing = api.list_folders()?;
    let lowered = name.to_lowercase();
    if existing.iter().any(|f| f.name.to_lowercase() == lowered) {
        return Err(GatewayError::Rejected(format!(
            "A folder with the name \"{name}\" already exists."
        )));
    }
    api.create_folder(name, color)
}

/// One background thread draining requests in submission order.
pub struct Worker {
    requests: Sender<Request>,
    completions: Receiver<Completion>,
}

impl Worker {
    pub fn spawn(api: Box<dyn HistoryApi>) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<Request>();
        let (completion_tx, completion_rx) = mpsc::channel();

        thread::spawn(move || {
            for request in request_rx {
                debug!(?request, "executing request");
                let completion = execute(api.as_ref(), request);
                if completion_tx.send(completion).is_err() {
                    break;
                }
            }
            info!("request worker stopped");
        });

        Self {
            requests: request_tx,
            completions: completion_rx,
        }
    }

    pub fn submit(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| anyhow!("request worker is no longer running"))
    }

    pub fn completions(&self) -> Vec<Completion> {
        self.completions.try_iter().collect()
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Serves canned data and records every call it receives.
    #[derive(Clone, Default)]
    pub struct FakeApi {
        pub folders: Vec<Folder>,
        pub items: Vec<HistoryItem>,
        pub fail_with: Option<GatewayError>,
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeApi {
        fn record(&self, call: String) -> Result<(), GatewayError> {
            self.calls.lock().expect("calls").push(call);
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls").clone()
        }
    }

    impl HistoryApi for FakeApi {
        fn list_history(&self) -> Result<Vec<HistoryItem>, GatewayError> {
            self.record(String::from("GET /history/"))?;
            Ok(self.items.clone())
        }

        fn list_folders(&self) -> Result<Vec<Folder>, GatewayError> {
            self.record(String::from("GET /api/folders/"))?;
            Ok(self.folders.clone())
        }

        fn move_item(&self, item_id: i64, folder_id: Option<i64>) -> Result<(), GatewayError> {
            self.record(format!("PUT /api/history/{item_id}/move/ {folder_id:?}"))
        }

        fn delete_item(&self, item_id: i64) -> Result<(), GatewayError> {
            self.record(format!("DELETE /delete-history/{item_id}"))
        }

        fn clear_history(&self) -> Result<(), GatewayError> {
            self.record(String::from("DELETE /history/clear/"))
        }

        fn create_folder(&self, name: &str, color: &str) -> Result<(), GatewayError> {
            self.record(format!("POST /api/folders/create/ {name} {color}"))
        }

        fn delete_folder(&self, folder_id: i64) -> Result<(), GatewayError> {
            self.record(format!("DELETE /api/folders/{folder_id}/delete/"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::fake::FakeApi;
    use super::*;

    fn folder(id: i64, name: &str) -> Folder {
        Folder {
            id,
            name: name.to_string(),
            color: String::from("#123456"),
        }
    }

    #[test]
    fn reload_fetches_folders_then_history() {
        let api = FakeApi {
            folders: vec![folder(1, "Papers")],
            ..FakeApi::default()
        };
        let Completion::Reloaded(Ok((folders, items))) = execute(&api, Request::Reload) else {
            panic!("expected reload");
        };
        assert_eq!(folders.len(), 1);
        assert!(items.is_empty());
        assert_eq!(api.calls(), vec!["GET /api/folders/", "GET /history/"]);
    }

    #[test]
    fn duplicate_folder_names_are_rejected_without_create_call() {
        let api = FakeApi {
            folders: vec![folder(1, "Catalysis")],
            ..FakeApi::default()
        };
        let completion = execute(
            &api,
            Request::CreateFolder {
                name: String::from("CATALYSIS"),
                color: String::from("#6c757d"),
            },
        );
        let Completion::Mutated { result, .. } = completion else {
            panic!("expected mutation");
        };
        assert_eq!(
            result,
            Err(GatewayError::Rejected(String::from(
                "A folder with the name \"CATALYSIS\" already exists."
            )))
        );
        assert_eq!(api.calls(), vec!["GET /api/folders/"]);
    }

    #[test]
    fn failures_come_back_as_completions() {
        let api = FakeApi {
            fail_with: Some(GatewayError::Status(500)),
            ..FakeApi::default()
        };
        let request = Request::MoveItem {
            item_id: 3,
            folder_id: None,
        };
        let Completion::Mutated { request: echoed, result } = execute(&api, request.clone())
        else {
            panic!("expected mutation");
        };
        assert_eq!(echoed, request);
        assert_eq!(result, Err(GatewayError::Status(500)));
    }

    #[test]
    fn worker_thread_delivers_completions() {
        let api = FakeApi::default();
        let worker = Worker::spawn(Box::new(api.clone()));
        worker.submit(Request::DeleteItem { item_id: 9 }).expect("submit");

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut done = Vec::new();
        while done.is_empty() && Instant::now() < deadline {
            done = worker.completions();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(done.len(), 1);
        assert_eq!(api.calls(), vec!["DELETE /delete-history/9"]);
    }
}
