use crate::expression::bytecode::{BuiltinId, BytecodeProgram, ConstVal, Op};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ValueSlot {
    F64(f64),
    Bool(bool),
}

#[derive(Debug, Clone)]
pub(crate) struct VmError {
    pub(crate) message: String,
}

impl VmError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "equation evaluation failed: {}", self.message)
    }
}

impl std::error::Error for VmError {}

impl ValueSlot {
    pub(crate) fn as_bool(self) -> Result<bool, VmError> {
        match self {
            Self::Bool(v) => Ok(v),
            Self::F64(v) => Ok(v != 0.0),
        }
    }

    pub(crate) fn as_f64(self) -> Result<f64, VmError> {
        match self {
            Self::F64(v) => Ok(v),
            Self::Bool(_) => Err(VmError::new("expected a number, got a boolean")),
        }
    }
}

/// Run `p` with `vars[i]` bound to `p.vars[i]`.
pub(crate) fn eval_program(p: &BytecodeProgram, vars: &[f64]) -> Result<ValueSlot, VmError> {
    let mut stack: Vec<ValueSlot> = Vec::with_capacity(16);

    for &op in &p.ops {
        match op {
            Op::PushConst(idx) => {
                let c = p
                    .consts
                    .get(idx.0 as usize)
                    .ok_or_else(|| VmError::new("const idx out of range"))?;
                stack.push(match *c {
                    ConstVal::F64(v) => ValueSlot::F64(v),
                    ConstVal::Bool(v) => ValueSlot::Bool(v),
                });
            }
            Op::LoadVar(idx) => {
                let v = vars
                    .get(idx.0 as usize)
                    .ok_or_else(|| VmError::new("variable slot out of range"))?;
                stack.push(ValueSlot::F64(*v));
            }

            Op::Neg => {
                let v = pop(&mut stack)?.as_f64()?;
                stack.push(ValueSlot::F64(-v));
            }
            Op::Not => {
                let v = pop(&mut stack)?.as_bool()?;
                stack.push(ValueSlot::Bool(!v));
            }
            Op::Add => arith(&mut stack, |a, b| a + b)?,
            Op::Sub => arith(&mut stack, |a, b| a - b)?,
            Op::Mul => arith(&mut stack, |a, b| a * b)?,
            Op::Div => arith(&mut stack, |a, b| a / b)?,
            Op::Mod => arith(&mut stack, |a, b| a % b)?,

            Op::Eq | Op::Ne => {
                let b = pop(&mut stack)?;
                let a = pop(&mut stack)?;
                let same = match (a, b) {
                    (ValueSlot::Bool(a), ValueSlot::Bool(b)) => a == b,
                    (a, b) => a.as_f64()? == b.as_f64()?,
                };
                stack.push(ValueSlot::Bool(same == (op == Op::Eq)));
            }
            Op::Lt => compare(&mut stack, |a, b| a < b)?,
            Op::Le => compare(&mut stack, |a, b| a <= b)?,
            Op::Gt => compare(&mut stack, |a, b| a > b)?,
            Op::Ge => compare(&mut stack, |a, b| a >= b)?,

            Op::And | Op::Or => {
                let b = pop(&mut stack)?.as_bool()?;
                let a = pop(&mut stack)?.as_bool()?;
                stack.push(ValueSlot::Bool(if op == Op::And { a && b } else { a || b }));
            }
            Op::Select => {
                let otherwise = pop(&mut stack)?;
                let then = pop(&mut stack)?;
                let cond = pop(&mut stack)?.as_bool()?;
                stack.push(if cond { then } else { otherwise });
            }

            Op::CallBuiltin { id, argc } => call_builtin(&mut stack, id, argc)?,
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(v), true) => Ok(v),
        _ => Err(VmError::new("malformed program: stack not balanced")),
    }
}

fn pop(stack: &mut Vec<ValueSlot>) -> Result<ValueSlot, VmError> {
    stack.pop().ok_or_else(|| VmError::new("stack underflow"))
}

fn arith(stack: &mut Vec<ValueSlot>, f: impl FnOnce(f64, f64) -> f64) -> Result<(), VmError> {
    let b = pop(stack)?.as_f64()?;
    let a = pop(stack)?.as_f64()?;
    stack.push(ValueSlot::F64(f(a, b)));
    Ok(())
}

fn compare(stack: &mut Vec<ValueSlot>, f: impl FnOnce(f64, f64) -> bool) -> Result<(), VmError> {
    let b = pop(stack)?.as_f64()?;
    let a = pop(stack)?.as_f64()?;
    stack.push(ValueSlot::Bool(f(a, b)));
    Ok(())
}

fn call_builtin(stack: &mut Vec<ValueSlot>, id: BuiltinId, argc: u8) -> Result<(), VmError> {
    let argc = usize::from(argc);
    if stack.len() < argc {
        return Err(VmError::new("stack underflow in builtin call"));
    }
    let mut args = [0.0f64; 3];
    for slot in args[..argc.min(3)].iter_mut().rev() {
        *slot = pop(stack)?.as_f64()?;
    }

    let [a, b, c] = args;
    let out = match id {
        BuiltinId::Abs => a.abs(),
        BuiltinId::Sin => a.sin(),
        BuiltinId::Cos => a.cos(),
        BuiltinId::Sqrt => a.sqrt(),
        BuiltinId::Floor => a.floor(),
        BuiltinId::Ceil => a.ceil(),
        BuiltinId::Round => a.round(),
        BuiltinId::Min => a.min(b),
        BuiltinId::Max => a.max(b),
        BuiltinId::Clamp => {
            if b.is_nan() || c.is_nan() || b > c {
                return Err(VmError::new("clamp bounds are out of order"));
            }
            a.clamp(b, c)
        }
        BuiltinId::Lerp => a + (b - a) * c,
    };
    stack.push(ValueSlot::F64(out));
    Ok(())
}
