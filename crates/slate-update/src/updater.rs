use bson::Document;
use bson::raw::RawDocument;

use crate::config::UpdateConfig;
use crate::error::UpdateError;
use crate::executor::{self, FieldChange};
use crate::modifier::{ModifierSpec, parse_modifiers};
use crate::oplog::{self, LogEntry, LogOp};
use crate::upsert;

/// One update command against a single document.
#[derive(Debug, Clone, Copy)]
pub struct UpdateRequest<'a> {
    /// Query that selected the document. Only read when upserting.
    pub query: &'a RawDocument,
    /// Operator document, e.g. `{ "$push": { "a": { "$each": [1], "$slice": 3 } } }`.
    pub update: &'a RawDocument,
    /// Create the document when nothing matched.
    pub upsert: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Nothing matched and upsert was not requested. Nothing was created.
    NoMatch,
    /// The matched document was updated in place. `log` is `None` when no
    /// field changed.
    Updated {
        changes: Vec<FieldChange>,
        log: Option<LogEntry>,
    },
    /// A new document was created from the query and the modifiers.
    Upserted {
        document: Document,
        changes: Vec<FieldChange>,
        log: LogEntry,
    },
}

/// Parses, applies and logs updates.
#[derive(Debug, Clone, Default)]
pub struct Updater {
    config: UpdateConfig,
}

impl Updater {
    pub fn new(config: UpdateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Run `request` against the matched document, if any.
    ///
    /// The operator document is validated before anything else, so a bad
    /// modifier is reported even when nothing matched.
    pub fn update(
        &self,
        target: Option<&mut Document>,
        request: &UpdateRequest<'_>,
    ) -> Result<UpdateOutcome, UpdateError> {
        let spec = parse_modifiers(request.update)?;
        match target {
            Some(doc) => {
                let (changes, log) = self.apply(doc, &spec)?;
                Ok(UpdateOutcome::Updated { changes, log })
            }
            None if request.upsert => self.upsert(request.query, &spec),
            None => Ok(UpdateOutcome::NoMatch),
        }
    }

    /// Apply parsed modifiers to an existing document and build its log entry.
    pub fn apply(
        &self,
        doc: &mut Document,
        spec: &ModifierSpec,
    ) -> Result<(Vec<FieldChange>, Option<LogEntry>), UpdateError> {
        let id = doc.get("_id").cloned().ok_or(UpdateError::MissingId)?;
        let changes = executor::execute(doc, spec)?;
        let mutations = oplog::translate(&changes, self.config.log_strategy);

        tracing::debug!(%id, logged = mutations.len(), "update applied");
        let log = (!mutations.is_empty()).then(|| LogEntry {
            target: id,
            op: LogOp::Update(mutations),
        });
        Ok((changes, log))
    }

    /// Create a document from the query's equality terms and apply `spec`.
    ///
    /// The result is logged as an insert of the full post-image, which a
    /// replica can apply without any prior state.
    pub fn upsert(
        &self,
        query: &RawDocument,
        spec: &ModifierSpec,
    ) -> Result<UpdateOutcome, UpdateError> {
        let mut document = upsert::base_document(query)?;
        let changes = executor::execute(&mut document, spec)?;
        let id = document.get("_id").cloned().ok_or(UpdateError::MissingId)?;

        tracing::debug!(%id, fields = document.len(), "upserted document");
        let log = LogEntry {
            target: id,
            op: LogOp::Insert(document.clone()),
        };
        Ok(UpdateOutcome::Upserted {
            document,
            changes,
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogStrategy;
    use crate::oplog::MutationKind;
    use bson::{Bson, doc, rawdoc};

    #[test]
    fn no_match_without_upsert_creates_nothing() {
        let updater = Updater::default();
        let query = rawdoc! { "_id": 1 };
        let update = rawdoc! { "$bit": { "flags": { "or": 1 } } };
        let outcome = updater
            .update(None, &UpdateRequest { query: &query, update: &update, upsert: false })
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NoMatch);
    }

    #[test]
    fn invalid_modifier_reported_without_match() {
        let updater = Updater::default();
        let query = rawdoc! { "_id": 1 };
        let update = rawdoc! { "$rename": { "a": "b" } };
        let err = updater
            .update(None, &UpdateRequest { query: &query, update: &update, upsert: false })
            .unwrap_err();
        assert!(matches!(err, UpdateError::InvalidModifier(_)));
    }

    #[test]
    fn update_without_change_is_not_logged() {
        let updater = Updater::default();
        let mut doc = doc! { "_id": 1 };
        let spec = parse_modifiers(&rawdoc! { "$bit": { "flags": { "and": 1 } } }).unwrap();
        let (changes, log) = updater.apply(&mut doc, &spec).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(log.is_none());
    }

    #[test]
    fn update_requires_id() {
        let updater = Updater::default();
        let mut doc = doc! { "a": [1] };
        let spec = parse_modifiers(&rawdoc! { "$push": { "a": 2 } }).unwrap();
        assert_eq!(
            updater.apply(&mut doc, &spec).unwrap_err(),
            UpdateError::MissingId
        );
        assert_eq!(doc, doc! { "a": [1] });
    }

    #[test]
    fn strategy_comes_from_config() {
        let updater = Updater::new(UpdateConfig {
            log_strategy: LogStrategy::RewriteAll,
        });
        assert_eq!(updater.config().log_strategy, LogStrategy::RewriteAll);
        let mut doc = doc! { "_id": 1, "a": [1] };
        let spec = parse_modifiers(&rawdoc! { "$push": { "a": 2 } }).unwrap();
        let (_, log) = updater.apply(&mut doc, &spec).unwrap();
        let LogOp::Update(mutations) = log.unwrap().op else {
            panic!("expected update");
        };
        assert_eq!(
            mutations[0].kind,
            MutationKind::RewrittenAssign(bson::bson!([1, 2]))
        );
    }

    #[test]
    fn upsert_logs_insert_of_post_image() {
        let updater = Updater::default();
        let query = rawdoc! { "_id": 2, "kind": "counter" };
        let update = rawdoc! { "$bit": { "flags": { "or": 1 } } };
        let outcome = updater
            .update(None, &UpdateRequest { query: &query, update: &update, upsert: true })
            .unwrap();
        let UpdateOutcome::Upserted { document, log, .. } = outcome else {
            panic!("expected upsert");
        };
        assert_eq!(document, doc! { "_id": 2, "kind": "counter", "flags": 1 });
        assert_eq!(log.target, Bson::Int32(2));
        assert_eq!(log.op, LogOp::Insert(document));
    }
}
