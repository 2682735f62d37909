mod parser;
mod types;
mod validate;

pub use parser::{parse_plan_str, DocumentFormat, ParsedDocument};
pub use types::{
    split_ref, ActionSpec, Binding, BindingSpec, ExportSpec, InputSpec, PlanDocument, ProviderSpec,
    RemoteSpec, ResourceSpec,
};
pub use validate::{validate_document, Validator};
