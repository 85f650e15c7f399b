pub mod answer;
pub mod ids;
pub mod import;
pub mod loaders;
pub mod question_type;
pub mod response;
pub mod schema;

pub use answer::{AnswerEntry, AnswerPayload, FileReference, OptionChoice};
pub use ids::{CategoryId, EnvelopeId, OptionId, QuestionId, QuestionnaireId, ResponseId};
pub use import::{SeedFile, SubmissionFile};
pub use loaders::{load_all_submission_files, load_seed_file};
pub use question_type::{CatalogError, QuestionKind, StorageSlot, TypeDescriptor, ValidationStrategy};
pub use response::{
    QuestionOptionResponse, QuestionResponse, ResponseDetail, SelectedOptionDetail,
    SubmissionEnvelope,
};
pub use schema::{
    Category, EntityRecord, Question, QuestionConstraints, QuestionOption, QuestionnaireTemplate,
    Sibling, SiblingScope,
};
