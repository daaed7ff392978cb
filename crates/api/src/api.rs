use serde::{Deserialize, Serialize};
use snafu::{OptionExt, Snafu};

/// Collection name the backend uses for chunked PDF excerpts.
///
/// Source payloads from this collection carry `pdf_*` fields merged in from the
/// parent document, so variant selection keys off the requested collection.
pub const CHUNK_COLLECTION: &str = "PDFchunks1";

/// Speaker role as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One history entry reduced to the shape the chat endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    /// Creates a wire turn for one message.
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Request body for `POST /api/chat`: the full ordered history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
}

/// Success body from `POST /api/chat`.
///
/// Both fields tolerate absence: a missing `response` is a fallback case for
/// the caller, not a decode error, and missing `sources` means no citations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatAnswer {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceRef>,
}

/// Opaque pointer into the backend's document store.
///
/// Owned by an assistant message; doubles as the `POST /api/sources` body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub object_id: String,
    pub collection: String,
}

impl SourceRef {
    /// Creates a reference into the given collection.
    pub fn new(object_id: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            collection: collection.into(),
        }
    }

    /// Returns true when this reference points at a PDF chunk.
    pub fn is_chunk(&self) -> bool {
        self.collection == CHUNK_COLLECTION
    }
}

/// Closed raw record returned by `POST /api/sources`.
///
/// The schema is deliberately closed: unknown fields fail deserialization
/// instead of being carried as an open-ended index, and which fields are
/// required is decided by [`SourceData::from_payload`]. The backend returns
/// the stored record as-is, so the bookkeeping fields it persists
/// (`chunk_id`/`doc_id` on chunks, `authors`/`file_path` on documents) are
/// part of the schema even though nothing displays them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcePayload {
    pub title: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub authors: Option<String>,
    pub file_path: Option<String>,
    // Stored as a number; arrives as an int or a float depending on the store.
    pub chunk_id: Option<serde_json::Number>,
    pub doc_id: Option<String>,
    pub chunk_text: Option<String>,
    pub pdf_title: Option<String>,
    pub pdf_date: Option<String>,
    pub pdf_url: Option<String>,
}

/// Validation failure for a source payload.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum SourceSchemaError {
    #[snafu(display("source payload from '{collection}' is missing required field '{field}'"))]
    MissingField {
        stage: &'static str,
        collection: String,
        field: &'static str,
    },
}

/// Resolved display data for one source card.
///
/// The variant is selected once, at the deserialization boundary, from the
/// collection the caller asked for; render code never inspects field presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceData {
    /// A chunk of a PDF, displayed with its parent document's title and date.
    Excerpt {
        title: String,
        date: String,
        body: String,
        link: Option<String>,
    },
    /// A whole document, displayed with its own title, date, and abstract.
    Document {
        title: String,
        date: String,
        body: String,
        link: Option<String>,
    },
}

impl SourceData {
    /// Validates a raw payload into the variant implied by `collection`.
    ///
    /// The link is read from `pdf_url` the same way for both variants and
    /// stays optional; every other variant field is required.
    pub fn from_payload(
        collection: &str,
        payload: SourcePayload,
    ) -> Result<Self, SourceSchemaError> {
        let link = payload.pdf_url;

        if collection == CHUNK_COLLECTION {
            let title = payload.pdf_title.context(MissingFieldSnafu {
                stage: "validate-excerpt",
                collection,
                field: "pdf_title",
            })?;
            let date = payload.pdf_date.context(MissingFieldSnafu {
                stage: "validate-excerpt",
                collection,
                field: "pdf_date",
            })?;
            let body = payload.chunk_text.context(MissingFieldSnafu {
                stage: "validate-excerpt",
                collection,
                field: "chunk_text",
            })?;

            return Ok(Self::Excerpt {
                title,
                date,
                body,
                link,
            });
        }

        let title = payload.title.context(MissingFieldSnafu {
            stage: "validate-document",
            collection,
            field: "title",
        })?;
        let date = payload.date.context(MissingFieldSnafu {
            stage: "validate-document",
            collection,
            field: "date",
        })?;
        let body = payload.abstract_text.context(MissingFieldSnafu {
            stage: "validate-document",
            collection,
            field: "abstract",
        })?;

        Ok(Self::Document {
            title,
            date,
            body,
            link,
        })
    }

    /// Card header label for the variant.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Excerpt { .. } => "Excerpt",
            Self::Document { .. } => "Document",
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Excerpt { title, .. } | Self::Document { title, .. } => title,
        }
    }

    pub fn date(&self) -> &str {
        match self {
            Self::Excerpt { date, .. } | Self::Document { date, .. } => date,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::Excerpt { body, .. } | Self::Document { body, .. } => body,
        }
    }

    pub fn link(&self) -> Option<&str> {
        match self {
            Self::Excerpt { link, .. } | Self::Document { link, .. } => link.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_request_serializes_lowercase_roles() {
        let request = ChatRequest {
            messages: vec![
                ChatTurn::new(TurnRole::User, "What is the capital of France?"),
                ChatTurn::new(TurnRole::Assistant, "Paris."),
            ],
        };

        let value = serde_json::to_value(&request).expect("request must serialize");
        assert_eq!(
            value,
            json!({
                "messages": [
                    { "role": "user", "content": "What is the capital of France?" },
                    { "role": "assistant", "content": "Paris." },
                ]
            })
        );
    }

    #[test]
    fn chat_answer_tolerates_missing_fields() {
        let answer: ChatAnswer = serde_json::from_value(json!({})).expect("empty body decodes");
        assert_eq!(answer.response, None);
        assert!(answer.sources.is_empty());

        let answer: ChatAnswer = serde_json::from_value(json!({
            "response": "Paris is the capital.",
            "sources": [{ "object_id": "x1", "collection": "PDFchunks1" }],
        }))
        .expect("full body decodes");
        assert_eq!(answer.response.as_deref(), Some("Paris is the capital."));
        assert_eq!(answer.sources, vec![SourceRef::new("x1", "PDFchunks1")]);
        assert!(answer.sources[0].is_chunk());
    }

    #[test]
    fn chunk_collection_payload_validates_as_excerpt() {
        let payload: SourcePayload = serde_json::from_value(json!({
            "pdf_title": "T",
            "pdf_date": "2024-01-01",
            "chunk_text": "C",
        }))
        .expect("chunk payload decodes");

        let data = SourceData::from_payload(CHUNK_COLLECTION, payload).expect("chunk validates");
        assert_eq!(data.kind_label(), "Excerpt");
        assert_eq!(data.title(), "T");
        assert_eq!(data.date(), "2024-01-01");
        assert_eq!(data.body(), "C");
        assert_eq!(data.link(), None);
    }

    #[test]
    fn other_collection_payload_validates_as_document() {
        let payload: SourcePayload = serde_json::from_value(json!({
            "title": "T2",
            "date": "2024-02-02",
            "abstract": "A",
            "pdf_url": "https://arxiv.org/pdf/1234.5678",
        }))
        .expect("document payload decodes");

        let data = SourceData::from_payload("ArxivPDFs", payload).expect("document validates");
        assert_eq!(data.kind_label(), "Document");
        assert_eq!(data.title(), "T2");
        assert_eq!(data.date(), "2024-02-02");
        assert_eq!(data.body(), "A");
        assert_eq!(data.link(), Some("https://arxiv.org/pdf/1234.5678"));
    }

    #[test]
    fn missing_required_field_is_a_typed_error() {
        let payload: SourcePayload = serde_json::from_value(json!({
            "pdf_title": "T",
            "pdf_date": "2024-01-01",
        }))
        .expect("partial payload decodes");

        let error = SourceData::from_payload(CHUNK_COLLECTION, payload)
            .expect_err("missing chunk_text must fail validation");
        assert!(matches!(
            error,
            SourceSchemaError::MissingField {
                field: "chunk_text",
                ..
            }
        ));

        let error = SourceData::from_payload("ArxivPDFs", SourcePayload::default())
            .expect_err("empty document payload must fail validation");
        assert!(matches!(
            error,
            SourceSchemaError::MissingField { field: "title", .. }
        ));
    }

    #[test]
    fn stored_chunk_record_validates_with_bookkeeping_fields() {
        // Chunk records keep their chunk_id/doc_id bookkeeping alongside the
        // merged pdf_* fields; none of it may trip the closed schema.
        let payload: SourcePayload = serde_json::from_value(json!({
            "chunk_id": 250,
            "doc_id": "8b6f1a22-4c3d-4a4e-9f5e-2f1f4c0d9b77",
            "chunk_text": "C",
            "pdf_title": "T",
            "pdf_date": "2024-01-01",
            "pdf_url": "https://arxiv.org/pdf/1234.5678",
        }))
        .expect("stored chunk record decodes");

        let data = SourceData::from_payload(CHUNK_COLLECTION, payload).expect("chunk validates");
        assert_eq!(data.kind_label(), "Excerpt");
        assert_eq!(data.link(), Some("https://arxiv.org/pdf/1234.5678"));
    }

    #[test]
    fn stored_document_record_validates_with_bookkeeping_fields() {
        let payload: SourcePayload = serde_json::from_value(json!({
            "title": "T2",
            "abstract": "A",
            "pdf_url": "https://arxiv.org/pdf/1234.5678",
            "date": "2024-02-02",
            "authors": "A. Author, B. Author",
            "file_path": "pdfs/1234.5678.pdf",
        }))
        .expect("stored document record decodes");

        let data = SourceData::from_payload("ArxivPDFs", payload).expect("document validates");
        assert_eq!(data.kind_label(), "Document");
        assert_eq!(data.body(), "A");
    }

    #[test]
    fn chunk_id_tolerates_float_representation() {
        let payload: SourcePayload = serde_json::from_value(json!({
            "chunk_id": 250.0,
            "doc_id": "d-17",
            "chunk_text": "C",
            "pdf_title": "T",
            "pdf_date": "2024-01-01",
        }))
        .expect("float chunk_id decodes");

        assert!(
            SourceData::from_payload(CHUNK_COLLECTION, payload).is_ok(),
            "float chunk_id must still validate as an excerpt"
        );
    }

    #[test]
    fn unknown_payload_fields_fail_deserialization() {
        let result: Result<SourcePayload, _> = serde_json::from_value(json!({
            "title": "T",
            "relevance_score": 0.93,
        }));

        assert!(result.is_err());
    }
}
