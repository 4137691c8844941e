pub mod command;
pub mod input;
pub mod parameter;
pub mod response;

// Re-export commonly used types at the model level.
pub use command::{
    ActionError, ActionOutput, ActionResult, Command, CommandAction, IntoActionResult, Params,
};
pub use input::{CommandInput, CommandPayload};
pub use parameter::{
    DateSpec, FileDelivery, FileHandle, FileSpec, NumberSpec, OptionsSupplier, Parameter,
    ParameterKind, SelectOption, SelectSpec, StringSpec,
};
pub use response::{InteractiveOption, InteractiveResponse, ResponseKind};
