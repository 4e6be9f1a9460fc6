use crate::expression::ast::{BinaryOp, Expr, UnaryOp};
use crate::expression::bytecode::{BuiltinId, BytecodeProgram, ConstVal, Op};
use crate::expression::error::EquationError;
use crate::expression::parser::parse_expr;

pub(crate) fn compile_source(src: &str) -> Result<BytecodeProgram, EquationError> {
    let ast = parse_expr(src)?;
    let mut program = BytecodeProgram::default();
    lower(&ast, &mut program)?;
    Ok(program)
}

fn lower(e: &Expr, p: &mut BytecodeProgram) -> Result<(), EquationError> {
    match e {
        Expr::Number(v) => {
            let idx = p.push_const(ConstVal::F64(*v));
            p.ops.push(Op::PushConst(idx));
        }
        Expr::Bool(v) => {
            let idx = p.push_const(ConstVal::Bool(*v));
            p.ops.push(Op::PushConst(idx));
        }
        Expr::Var(name) => {
            let slot = p.var_slot(name);
            p.ops.push(Op::LoadVar(slot));
        }
        Expr::Constant(name) => {
            let v = named_constant(name)
                .ok_or_else(|| EquationError::new(0, format!("unknown identifier '{name}'")))?;
            let idx = p.push_const(ConstVal::F64(v));
            p.ops.push(Op::PushConst(idx));
        }
        Expr::Unary(op, operand) => {
            lower(operand, p)?;
            p.ops.push(match op {
                UnaryOp::Neg => Op::Neg,
                UnaryOp::Not => Op::Not,
            });
        }
        Expr::Binary { op, lhs, rhs } => {
            lower(lhs, p)?;
            lower(rhs, p)?;
            p.ops.push(binary(*op));
        }
        Expr::Choose {
            condition,
            when_true,
            when_false,
        } => {
            lower(condition, p)?;
            lower(when_true, p)?;
            lower(when_false, p)?;
            p.ops.push(Op::Select);
        }
        Expr::Call { func, args } => {
            let (id, arity) = BuiltinId::from_name(func)
                .ok_or_else(|| EquationError::new(0, format!("unknown function '{func}'")))?;
            if args.len() != usize::from(arity) {
                return Err(EquationError::new(
                    0,
                    format!("{func} expects {arity} args, got {}", args.len()),
                ));
            }
            for a in args {
                lower(a, p)?;
            }
            p.ops.push(Op::CallBuiltin { id, argc: arity });
        }
    }
    Ok(())
}

fn binary(op: BinaryOp) -> Op {
    match op {
        BinaryOp::Add => Op::Add,
        BinaryOp::Sub => Op::Sub,
        BinaryOp::Mul => Op::Mul,
        BinaryOp::Div => Op::Div,
        BinaryOp::Mod => Op::Mod,
        BinaryOp::Eq => Op::Eq,
        BinaryOp::Ne => Op::Ne,
        BinaryOp::Lt => Op::Lt,
        BinaryOp::Le => Op::Le,
        BinaryOp::Gt => Op::Gt,
        BinaryOp::Ge => Op::Ge,
        BinaryOp::And => Op::And,
        BinaryOp::Or => Op::Or,
    }
}

fn named_constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        _ => None,
    }
}
