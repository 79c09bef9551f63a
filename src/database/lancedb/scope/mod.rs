
use crate::database::lancedb::StoredRecord;
use crate::{RagError, Result};

/// Metadata filter for searches and deletes.
///
/// The workspace is fixed at construction and cannot be removed or replaced, so
/// every predicate built from a scope is confined to one tenant. Optional fields
/// narrow the scope further and are combined with AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryScope {
    workspace_id: String,
    user_id: Option<String>,
    channel_id: Option<String>,
    document_id: Option<String>,
}

/// What to remove in a delete call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteCriteria {
    /// Specific vector identifiers, each of which must belong to the caller's workspace
    Ids(Vec<String>),
    /// Every record matching the scope
    Scope(QueryScope),
}

impl QueryScope {
    #[inline]
    pub fn workspace(workspace_id: impl Into<String>) -> Result<Self> {
        let workspace_id = workspace_id.into();
        if workspace_id.trim().is_empty() {
            return Err(RagError::Validation(
                "workspaceId must not be empty".to_string(),
            ));
        }

        Ok(Self {
            workspace_id,
            user_id: None,
            channel_id: None,
            document_id: None,
        })
    }

    #[inline]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[inline]
    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    #[inline]
    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    #[inline]
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// SQL filter understood by LanceDB
    #[inline]
    pub fn to_predicate(&self) -> String {
        let mut clauses = vec![equals("workspace_id", &self.workspace_id)];
        if let Some(user_id) = &self.user_id {
            clauses.push(equals("user_id", user_id));
        }
        if let Some(channel_id) = &self.channel_id {
            clauses.push(equals("channel_id", channel_id));
        }
        if let Some(document_id) = &self.document_id {
            clauses.push(equals("document_id", document_id));
        }
        clauses.join(" AND ")
    }

    /// Whether a record satisfies every field of this scope
    #[inline]
    pub fn matches(&self, record: &StoredRecord) -> bool {
        if record.workspace_id != self.workspace_id {
            return false;
        }

        let message = record.message();
        let document = record.document();

        let user_ok = self
            .user_id
            .as_ref()
            .is_none_or(|u| message.is_some_and(|m| &m.user_id == u));
        let channel_ok = self
            .channel_id
            .as_ref()
            .is_none_or(|c| message.is_some_and(|m| &m.channel_id == c));
        let document_ok = self
            .document_id
            .as_ref()
            .is_none_or(|d| document.is_some_and(|doc| &doc.document_id == d));

        user_ok && channel_ok && document_ok
    }
}

/// Quote a value as an SQL string literal
#[inline]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `column IN ('a', 'b', ...)` for a non-empty list of values
#[inline]
pub fn in_list(column: &str, values: &[String]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
    format!("{} IN ({})", column, quoted.join(", "))
}

fn equals(column: &str, value: &str) -> String {
    format!("{} = {}", column, quote_literal(value))
}
