// Tool-augmented chat
//
// types: the transcript / gateway wire model
// orchestrator: the bounded multi-round turn loop

pub mod orchestrator;
pub mod types;

pub use orchestrator::{ChatConfig, ChatOrchestrator};
pub use types::{
    ChatMessage, Choice, CompletionRequest, CompletionResponse, FunctionCall,
    FunctionDeclaration, FunctionSpec, ToolCallRequest,
};
