#![allow(dead_code)]

use bson::{Bson, Document, RawDocumentBuf, doc};
use slate_update::{LogEntry, UpdateConfig, UpdateOutcome, UpdateRequest, Updater, replay};

/// An in-memory stand-in for a collection: documents matched by `_id` only,
/// plus the change log the primary emitted.
pub struct Collection {
    pub docs: Vec<Document>,
    pub log: Vec<LogEntry>,
    updater: Updater,
}

impl Collection {
    pub fn new() -> Self {
        Self::with_config(UpdateConfig::default())
    }

    pub fn with_config(config: UpdateConfig) -> Self {
        Self {
            docs: Vec::new(),
            log: Vec::new(),
            updater: Updater::new(config),
        }
    }

    pub fn insert(&mut self, doc: Document) {
        self.log.push(LogEntry {
            target: doc.get("_id").cloned().unwrap(),
            op: slate_update::LogOp::Insert(doc.clone()),
        });
        self.docs.push(doc);
    }

    pub fn find(&self, id: impl Into<Bson>) -> Option<&Document> {
        let id = id.into();
        self.docs.iter().find(|d| d.get("_id") == Some(&id))
    }

    /// Field of the document with `_id == id`; `None` if either is missing.
    pub fn field(&self, id: impl Into<Bson>, field: &str) -> Option<Bson> {
        self.find(id).and_then(|d| d.get(field).cloned())
    }

    /// Run an update selected by `_id`, recording any log entry.
    pub fn update(
        &mut self,
        id: impl Into<Bson>,
        update: RawDocumentBuf,
        upsert: bool,
    ) -> Result<UpdateOutcome, slate_update::UpdateError> {
        let id = id.into();
        let query = id_query(id.clone());
        let request = UpdateRequest {
            query: &query,
            update: &update,
            upsert,
        };
        let target = self.docs.iter_mut().find(|d| d.get("_id") == Some(&id));
        let outcome = self.updater.update(target, &request)?;
        match &outcome {
            UpdateOutcome::NoMatch => {}
            UpdateOutcome::Updated { log, .. } => self.log.extend(log.clone()),
            UpdateOutcome::Upserted { document, log, .. } => {
                self.docs.push(document.clone());
                self.log.push(log.clone());
            }
        }
        Ok(outcome)
    }

    /// Replay a single log entry the way a replica would.
    pub fn apply_log(&mut self, entry: &LogEntry) {
        let pos = self
            .docs
            .iter()
            .position(|d| d.get("_id") == Some(&entry.target));
        let pre = pos.map(|i| self.docs[i].clone());
        let post = replay(pre, entry).unwrap();
        match pos {
            Some(i) => self.docs[i] = post,
            None => self.docs.push(post),
        }
    }
}

pub fn id_query(id: Bson) -> RawDocumentBuf {
    RawDocumentBuf::try_from(&doc! { "_id": id }).unwrap()
}

pub fn ints(values: &[i32]) -> Bson {
    Bson::Array(values.iter().map(|v| Bson::Int32(*v)).collect())
}
