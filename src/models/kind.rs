//! Collection kinds: which labels and edge types a collection uses.

use crate::config::CollectionConfig;
use crate::error::AppError;
use crate::graph::{Identifier, Labels, UniqueConstraint, THING_LABEL, UUID_PROPERTY};

/// Label carried by every collection node, whatever its kind.
pub const BASE_LABEL: &str = "ContentCollection";

/// A validated collection kind.
///
/// Every kind shares [`BASE_LABEL`] and differs in its type labels and
/// membership edge type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionKind {
    name: String,
    labels: Labels,
    type_labels: Vec<Identifier>,
    relation: Identifier,
    extra_relation: Option<Identifier>,
    key: Identifier,
}

impl CollectionKind {
    /// Validates every label and edge type of a configured kind.
    pub fn from_config(config: &CollectionConfig) -> Result<Self, AppError> {
        if config.name.trim().is_empty() {
            return Err(AppError::Validation("collection kind needs a name".into()));
        }
        // Delete strips the kind labels; the shared identity must survive it.
        if config.labels.iter().any(|l| l == THING_LABEL) {
            return Err(AppError::Validation(format!(
                "collection kind {} must not use {} as a type label",
                config.name, THING_LABEL
            )));
        }

        let type_labels = config
            .labels
            .iter()
            .filter(|l| l.as_str() != BASE_LABEL)
            .map(|l| Identifier::new(l))
            .collect::<Result<Vec<_>, _>>()?;
        let labels = Labels::new(
            std::iter::once(BASE_LABEL).chain(type_labels.iter().map(Identifier::as_str)),
        )?;

        Ok(Self {
            name: config.name.clone(),
            labels,
            type_labels,
            relation: Identifier::new(&config.relation)?,
            extra_relation: config
                .extra_relation_for_delete
                .as_deref()
                .map(Identifier::new)
                .transpose()?,
            key: Identifier::new(UUID_PROPERTY)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base label followed by the type labels.
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Kind-specific labels, without the base label.
    pub fn type_labels(&self) -> &[Identifier] {
        &self.type_labels
    }

    /// Membership edge type.
    pub fn relation(&self) -> &Identifier {
        &self.relation
    }

    /// Edge type also removed on delete, if any.
    pub fn extra_relation(&self) -> Option<&Identifier> {
        self.extra_relation.as_ref()
    }

    /// Uniqueness constraints this kind relies on: `uuid` on every label.
    pub fn constraints(&self) -> Vec<UniqueConstraint> {
        self.labels
            .iter()
            .map(|label| UniqueConstraint {
                label: label.clone(),
                property: self.key.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_package_kind() {
        let kind = CollectionKind::from_config(&CollectionConfig::story_package()).unwrap();

        assert_eq!(kind.labels().to_cypher(), "ContentCollection:Curation:StoryPackage");
        assert_eq!(kind.type_labels().len(), 2);
        assert_eq!(kind.relation().as_str(), "SELECTS");
        assert_eq!(kind.extra_relation().map(Identifier::as_str), Some("IS_CURATED_FOR"));
    }

    #[test]
    fn test_content_package_kind_has_only_base_label() {
        let kind = CollectionKind::from_config(&CollectionConfig::content_package()).unwrap();

        assert_eq!(kind.labels().to_cypher(), "ContentCollection");
        assert!(kind.type_labels().is_empty());
        assert!(kind.extra_relation().is_none());
    }

    #[test]
    fn test_constraints_cover_every_label() {
        let kind = CollectionKind::from_config(&CollectionConfig::story_package()).unwrap();
        let constraints: Vec<String> = kind.constraints().iter().map(|c| c.to_string()).collect();

        assert_eq!(
            constraints,
            vec![
                ":ContentCollection(uuid)",
                ":Curation(uuid)",
                ":StoryPackage(uuid)"
            ]
        );
    }

    #[test]
    fn test_rejects_injected_relation() {
        let mut config = CollectionConfig::content_package();
        config.relation = "CONTAINS]->() DETACH DELETE (x".into();

        let err = CollectionKind::from_config(&config).unwrap_err();
        assert!(matches!(err, AppError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_rejects_thing_type_label() {
        let mut config = CollectionConfig::content_package();
        config.labels = vec!["Thing".into()];

        let err = CollectionKind::from_config(&config).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("Thing"));
    }

    #[test]
    fn test_rejects_bad_label() {
        let mut config = CollectionConfig::story_package();
        config.labels.push("Bad Label".into());

        assert!(CollectionKind::from_config(&config).is_err());
    }
}
