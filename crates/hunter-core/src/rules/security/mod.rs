//! Injection detectors

pub mod add_type;
pub mod command_injection;
pub mod dangerous_method;
pub mod foreach_object;
pub mod invoke_expression;
pub mod member_injection;
pub mod unsafe_escaping;

pub use add_type::AddTypeInjection;
pub use command_injection::CommandInjection;
pub use dangerous_method::DangerousMethodInjection;
pub use foreach_object::ForEachObjectInjection;
pub use invoke_expression::InvokeExpressionInjection;
pub use member_injection::MemberInjection;
pub use unsafe_escaping::UnsafeEscaping;
