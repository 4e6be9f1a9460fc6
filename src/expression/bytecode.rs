#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConstIdx(pub(crate) u32);

/// Index into [`BytecodeProgram::vars`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VarIdx(pub(crate) u32);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConstVal {
    F64(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuiltinId {
    Min,
    Max,
    Clamp,
    Abs,
    Sin,
    Cos,
    Lerp,
    Sqrt,
    Floor,
    Ceil,
    Round,
}

impl BuiltinId {
    pub(crate) fn from_name(name: &str) -> Option<(Self, u8)> {
        Some(match name {
            "min" => (Self::Min, 2),
            "max" => (Self::Max, 2),
            "clamp" => (Self::Clamp, 3),
            "abs" => (Self::Abs, 1),
            "sin" => (Self::Sin, 1),
            "cos" => (Self::Cos, 1),
            "lerp" => (Self::Lerp, 3),
            "sqrt" => (Self::Sqrt, 1),
            "floor" => (Self::Floor, 1),
            "ceil" => (Self::Ceil, 1),
            "round" => (Self::Round, 1),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    PushConst(ConstIdx),
    LoadVar(VarIdx),

    Neg,
    Not,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    /// Pops `otherwise`, `then`, `cond`; pushes the chosen branch.
    Select,

    CallBuiltin { id: BuiltinId, argc: u8 },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct BytecodeProgram {
    pub(crate) ops: Vec<Op>,
    pub(crate) consts: Vec<ConstVal>,
    /// Variable names referenced by `LoadVar`, without the `$`.
    pub(crate) vars: Vec<String>,
}

impl BytecodeProgram {
    pub(crate) fn push_const(&mut self, c: ConstVal) -> ConstIdx {
        let idx = ConstIdx(self.consts.len() as u32);
        self.consts.push(c);
        idx
    }

    pub(crate) fn var_slot(&mut self, name: &str) -> VarIdx {
        if let Some(i) = self.vars.iter().position(|v| v == name) {
            return VarIdx(i as u32);
        }
        self.vars.push(name.to_owned());
        VarIdx((self.vars.len() - 1) as u32)
    }
}
