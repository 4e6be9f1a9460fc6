//! `$name` equations used wherever a numeric command field is given as a string.
//!
//! Source text is lexed, parsed into an [`ast::Expr`], lowered to bytecode and run on a small
//! stack VM. Variables are bound by name before evaluation, so an unbound `$name` is reported
//! as a missing variable rather than a syntax error.

pub(crate) mod ast;
pub(crate) mod bytecode;
pub(crate) mod compile;
pub(crate) mod error;
pub(crate) mod lexer;
pub(crate) mod parser;
pub(crate) mod vm;

use crate::foundation::error::{MovingImagesError, MovingImagesResult};

/// Evaluate `src` to a number, looking `$name` variables up through `lookup`.
///
/// Boolean results become `1.0` / `0.0`.
pub(crate) fn evaluate(
    src: &str,
    lookup: impl Fn(&str) -> MovingImagesResult<Option<f64>>,
) -> MovingImagesResult<f64> {
    let program = compile::compile_source(src)?;
    let mut bound = Vec::with_capacity(program.vars.len());
    for name in &program.vars {
        let v = lookup(name)?
            .ok_or_else(|| MovingImagesError::missing_variable(format!("${name}")))?;
        bound.push(v);
    }
    let out = vm::eval_program(&program, &bound)
        .map_err(|e| MovingImagesError::invalid_parameter(format!("'{src}': {e}")))?;
    Ok(match out {
        vm::ValueSlot::F64(v) => v,
        vm::ValueSlot::Bool(b) => f64::from(u8::from(b)),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/expression/eval.rs"]
mod tests;
