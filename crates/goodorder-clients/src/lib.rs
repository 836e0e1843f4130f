//! HTTP implementations of the capability ports: OCR extraction, the
//! policy record API, the LLM server, and the vector index service.

pub mod llm;
pub mod ocr;
pub mod policy;
pub mod vector;

pub use llm::LlmClient;
pub use ocr::OcrClient;
pub use policy::PolicyApiClient;
pub use vector::VectorApiClient;
