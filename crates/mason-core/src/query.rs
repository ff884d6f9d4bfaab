use serde::{Deserialize, Serialize};

/// Coordinate field a query clause matches against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum QueryField {
    GroupId,
    ArtifactId,
    Version,
    Packaging,
    Classifier,
}

/// One term clause: an exact value or a `*`/`?` wildcard pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryClause {
    pub field: QueryField,
    pub pattern: String,
}

/// Conjunction of clauses over coordinate fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactQuery {
    pub clauses: Vec<QueryClause>,
}

impl ArtifactQuery {
    pub fn term(field: QueryField, pattern: impl Into<String>) -> Self {
        Self {
            clauses: vec![QueryClause {
                field,
                pattern: pattern.into(),
            }],
        }
    }

    pub fn and(mut self, field: QueryField, pattern: impl Into<String>) -> Self {
        self.clauses.push(QueryClause {
            field,
            pattern: pattern.into(),
        });
        self
    }

    /// Convenience for the common group+artifact lookup.
    pub fn coordinates(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self::term(QueryField::GroupId, group_id).and(QueryField::ArtifactId, artifact_id)
    }
}
