use std::fs;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::entities::{null_as_default, Metadata};
use crate::{CatalogError, CatalogResult};

pub const RESOURCE_KIND: &str = "Resource";
pub const RESOURCE_TAG: &str = "resource";
pub const EXTERNAL_TAG: &str = "external";

/// A manifest document before its spec is typed. `spec` stays an open map so each kind can
/// decode it on its own terms.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntity {
    #[serde(default, deserialize_with = "null_as_default")]
    pub api_version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Metadata,
    #[serde(default, deserialize_with = "null_as_default")]
    pub spec: serde_json::Map<String, serde_json::Value>,
}

impl RawEntity {
    /// Documents without a kind or name are separators or placeholders, not entities.
    pub fn is_blank(&self) -> bool {
        self.kind.is_empty() || self.metadata.name.is_empty()
    }
}

/// Apply the source-level tag conventions. Resources are always tagged `resource` (first) and
/// entities from an external source are tagged `external` (last). Neither tag is duplicated.
pub fn apply_tag_conventions(entity: &mut RawEntity, external: bool) {
    if entity.kind == RESOURCE_KIND && !entity.metadata.has_tag(RESOURCE_TAG) {
        entity.metadata.tags.insert(0, RESOURCE_TAG.to_string());
    }

    if external && !entity.metadata.has_tag(EXTERNAL_TAG) {
        entity.metadata.tags.push(EXTERNAL_TAG.to_string());
    }
}

/// Documents of one manifest stream, parsed in order up to the first syntax error. Typing each
/// document into a [`RawEntity`] happens lazily in [`ManifestDocuments::iter`], which can be
/// called any number of times.
#[derive(Clone, Debug)]
pub struct ManifestDocuments {
    documents: Vec<serde_yaml::Value>,
    syntax_error: Option<String>,
    external: bool,
}

impl ManifestDocuments {
    /// Parse never fails as a whole: documents before a syntax error are kept and the error
    /// itself ends [`ManifestDocuments::iter`].
    pub fn parse(content: &str, external: bool) -> Self {
        let mut documents = Vec::new();
        let mut syntax_error = None;
        for document in serde_yaml::Deserializer::from_str(content) {
            match serde_yaml::Value::deserialize(document) {
                Ok(value) => documents.push(value),
                Err(e) => {
                    syntax_error = Some(e.to_string());
                    break;
                }
            }
        }

        Self {
            documents,
            syntax_error,
            external,
        }
    }

    pub fn from_reader<R: Read>(mut reader: R, external: bool) -> CatalogResult<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Ok(Self::parse(&content, external))
    }

    pub fn from_path<P: AsRef<Path>>(path: P, external: bool) -> CatalogResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content, external))
    }

    /// Number of well-formed documents in the stream, blank ones included.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Non-blank entities in stream order. A document that fails to decode yields an error item
    /// and iteration carries on with the next document. A syntax error is the last item.
    pub fn iter(&self) -> impl Iterator<Item = CatalogResult<RawEntity>> + '_ {
        let syntax_error = self.syntax_error.as_ref().map(|message| {
            Err(CatalogError::ManifestSyntax {
                index: self.documents.len(),
                message: message.clone(),
            })
        });

        self.documents
            .iter()
            .enumerate()
            .filter_map(move |(index, document)| self.decode(index, document))
            .chain(syntax_error)
    }

    fn decode(
        &self,
        index: usize,
        document: &serde_yaml::Value,
    ) -> Option<CatalogResult<RawEntity>> {
        if document.is_null() {
            return None;
        }

        let mut entity = match serde_yaml::from_value::<RawEntity>(document.clone()) {
            Ok(entity) => entity,
            Err(source) => return Some(Err(CatalogError::ManifestDocument { index, source })),
        };

        if entity.is_blank() {
            debug!(index, "skipping blank manifest document");
            return None;
        }

        apply_tag_conventions(&mut entity, self.external);
        Some(Ok(entity))
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{apply_tag_conventions, ManifestDocuments, RawEntity};
    use crate::CatalogError;

    const MULTI_DOCUMENT: &str = r#"
apiVersion: backstage.io/v1alpha1
kind: Component
metadata:
  name: payments
  description: Payments service
  tags: [java]
  links:
    - url: https://wiki.example.com/payments
      title: Wiki
spec:
  type: service
  owner: team-a
---
---
kind: Component
metadata:
  description: no name so this document is skipped
---
apiVersion: backstage.io/v1alpha1
kind: Resource
metadata:
  name: orders-db
  tags:
spec:
  type: database
  owner: team-b
"#;

    fn names(documents: &ManifestDocuments) -> Vec<String> {
        documents
            .iter()
            .map(|r| r.unwrap().metadata.name)
            .collect()
    }

    #[test]
    fn skips_blank_documents() {
        let documents = ManifestDocuments::parse(MULTI_DOCUMENT, false);

        assert_eq!(vec!["payments", "orders-db"], names(&documents));
    }

    #[test]
    fn iteration_is_restartable() {
        let documents = ManifestDocuments::parse(MULTI_DOCUMENT, false);

        assert_eq!(names(&documents), names(&documents));
    }

    #[test]
    fn decodes_metadata_and_open_spec() {
        let documents = ManifestDocuments::parse(MULTI_DOCUMENT, false);
        let payments = documents.iter().next().unwrap().unwrap();

        assert_eq!("backstage.io/v1alpha1", payments.api_version);
        assert_eq!("Payments service", payments.metadata.description);
        assert_eq!("Wiki", payments.metadata.links[0].title);
        assert_eq!("team-a", payments.spec["owner"]);
    }

    #[test]
    fn resource_gets_resource_tag() {
        let documents = ManifestDocuments::parse(MULTI_DOCUMENT, false);
        let resource = documents.iter().nth(1).unwrap().unwrap();

        assert_eq!(vec!["resource"], resource.metadata.tags);
    }

    #[test]
    fn external_source_tags_every_entity() {
        let documents = ManifestDocuments::parse(MULTI_DOCUMENT, true);
        let tags: Vec<Vec<String>> = documents
            .iter()
            .map(|r| r.unwrap().metadata.tags)
            .collect();

        assert_eq!(
            vec![
                vec!["java".to_string(), "external".to_string()],
                vec!["resource".to_string(), "external".to_string()],
            ],
            tags
        );
    }

    #[test_case(false => vec!["resource".to_string()]; "internal")]
    #[test_case(true => vec!["resource".to_string(), "external".to_string()]; "external")]
    fn tag_conventions_are_idempotent(external: bool) -> Vec<String> {
        let mut entity = RawEntity {
            kind: "Resource".to_string(),
            ..Default::default()
        };
        entity.metadata.name = "queue".to_string();

        apply_tag_conventions(&mut entity, external);
        apply_tag_conventions(&mut entity, external);
        entity.metadata.tags
    }

    #[test]
    fn undecodable_document_does_not_stop_the_stream() {
        let content = r#"
kind: Component
metadata:
  name: first
---
kind: Component
metadata:
  name: [not, a, string]
---
kind: Component
metadata:
  name: third
"#;
        let documents = ManifestDocuments::parse(content, false);
        let results: Vec<_> = documents.iter().collect();

        assert_eq!(3, results.len());
        assert!(matches!(
            results[1],
            Err(CatalogError::ManifestDocument { index: 1, .. })
        ));
        assert_eq!("third", results[2].as_ref().unwrap().metadata.name);
    }

    #[test]
    fn syntax_error_ends_the_stream_after_earlier_documents() {
        let content =
            "kind: Component\nmetadata:\n  name: first\n---\nkind: Component\nmetadata: {name: broken\n";
        let documents = ManifestDocuments::parse(content, false);
        let results: Vec<_> = documents.iter().collect();

        assert_eq!(1, documents.len());
        assert_eq!(2, results.len());
        assert_eq!("first", results[0].as_ref().unwrap().metadata.name);
        assert!(matches!(
            results[1],
            Err(CatalogError::ManifestSyntax { index: 1, .. })
        ));
    }

    #[test]
    fn syntax_error_in_first_document_yields_only_the_error() {
        let documents = ManifestDocuments::parse("kind: Component\nmetadata: {name: broken\n", false);
        let results: Vec<_> = documents.iter().collect();

        assert!(documents.is_empty());
        assert_eq!(1, results.len());
        assert!(matches!(
            results[0],
            Err(CatalogError::ManifestSyntax { index: 0, .. })
        ));
    }
}
