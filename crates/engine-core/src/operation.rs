//! Names for every call the session makes against the engine.
//!
//! These are purely logical labels: they tag log lines and error values so
//! a failure can be traced back to the engine call that produced it.

use std::fmt;

/// One engine call routed through the dispatcher.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Shutdown,
    Open,
    Save,
    SaveAs,
    Close,
    Rebuild,
    Revision,
    AddComponent,
    RemoveComponent,
    GetTransform,
    SetTransform,
    Select,
    Delete,
    SetFixed,
}

impl Operation {
    /// Short lowercase name, used in log fields and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Shutdown => "shutdown",
            Operation::Open => "open",
            Operation::Save => "save",
            Operation::SaveAs => "save-as",
            Operation::Close => "close",
            Operation::Rebuild => "rebuild",
            Operation::Revision => "revision",
            Operation::AddComponent => "add-component",
            Operation::RemoveComponent => "remove-component",
            Operation::GetTransform => "get-transform",
            Operation::SetTransform => "set-transform",
            Operation::Select => "select",
            Operation::Delete => "delete",
            Operation::SetFixed => "set-fixed",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
