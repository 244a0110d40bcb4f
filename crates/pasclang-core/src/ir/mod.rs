//! Backend SSA IR.
//!
//! A [`Module`] holds named global variables and functions; a defined
//! function is a list of basic blocks over a flat table of typed SSA
//! values. The instruction set is the minimum the lowering pass needs:
//! integer arithmetic, signed comparisons, logical not, bitcast,
//! getelementptr, load/store, alloca, call and branches.
//!
//! Values are written `%n` and blocks `bb<n>` in the textual dump; the
//! first `params.len()` values of a defined function are its
//! parameters.

pub mod builder;
pub mod verify;

pub use builder::{FunctionBuilder, ModuleBuilder};
pub use verify::verify;

use std::fmt;

/// An SSA value within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A basic block within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// The backend type lattice: i1, i8, i32 and pointers over them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    I1,
    I8,
    I32,
    Ptr(Box<IrType>),
}

impl IrType {
    /// Wrap this type in one level of pointer.
    pub fn ptr(self) -> IrType {
        IrType::Ptr(Box::new(self))
    }

    /// The pointed-to type, if this is a pointer.
    pub fn pointee(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, IrType::Ptr(_))
    }

    /// Size in bytes of one cell of this type.
    pub fn size(&self) -> u32 {
        match self {
            IrType::I1 | IrType::I8 => 1,
            IrType::I32 => 4,
            IrType::Ptr(_) => 8,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::I1 => write!(f, "i1"),
            IrType::I8 => write!(f, "i8"),
            IrType::I32 => write!(f, "i32"),
            IrType::Ptr(inner) => write!(f, "{}*", inner),
        }
    }
}

/// Integer arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Sdiv,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Sdiv => "sdiv",
        };
        f.write_str(text)
    }
}

/// Signed comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpCond {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl fmt::Display for IcmpCond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IcmpCond::Eq => "eq",
            IcmpCond::Ne => "ne",
            IcmpCond::Slt => "slt",
            IcmpCond::Sle => "sle",
            IcmpCond::Sgt => "sgt",
            IcmpCond::Sge => "sge",
        };
        f.write_str(text)
    }
}

/// One instruction; `result` is `Some` when the instruction produces a
/// value.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub result: Option<ValueId>,
    pub kind: InstrKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    ConstInt(i32),
    ConstBool(bool),
    ConstByte(u8),
    /// Null pointer of the given pointer type.
    ConstNull(IrType),
    Binary {
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    Icmp {
        cond: IcmpCond,
        lhs: ValueId,
        rhs: ValueId,
    },
    Not(ValueId),
    Bitcast {
        value: ValueId,
        ty: IrType,
    },
    /// Single-index address computation over a pointer.
    GetElementPtr {
        base: ValueId,
        index: ValueId,
    },
    Load {
        address: ValueId,
    },
    Store {
        address: ValueId,
        value: ValueId,
    },
    /// Stack slot holding one cell of the given type; the result is
    /// the slot's address.
    Alloca(IrType),
    Call {
        callee: String,
        args: Vec<ValueId>,
    },
    /// Address of a named module global.
    GlobalAddr(String),
}

/// Block terminators.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    },
    Ret(Option<ValueId>),
}

/// A basic block: instructions then exactly one terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub instrs: Vec<Instr>,
    pub terminator: Option<Terminator>,
}

impl Block {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            instrs: Vec::new(),
            terminator: None,
        }
    }
}

/// The blocks and value table of a defined function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionData {
    pub blocks: Vec<Block>,
    /// Type of each [`ValueId`]; the first `params.len()` entries are
    /// the parameters.
    pub values: Vec<IrType>,
}

/// A function: either a declaration resolved by the linker or a
/// definition carried in the module.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    External,
    Defined(FunctionData),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<(String, IrType)>,
    pub ret: Option<IrType>,
    pub body: FunctionBody,
}

impl Function {
    pub fn data(&self) -> Option<&FunctionData> {
        match &self.body {
            FunctionBody::Defined(data) => Some(data),
            FunctionBody::External => None,
        }
    }
}

/// A named global variable.
///
/// Globals carry their default initial value implicitly: zero, false
/// or null depending on the type.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVar {
    pub name: String,
    pub ty: IrType,
}

/// A whole compilation unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub globals: Vec<GlobalVar>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&GlobalVar> {
        self.globals.iter().find(|g| g.name == name)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for global in &self.globals {
            writeln!(f, "@{} = global {} zeroinitializer", global.name, global.ty)?;
        }
        if !self.globals.is_empty() {
            writeln!(f)?;
        }

        for function in &self.functions {
            let ret = function
                .ret
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "void".to_string());
            let params = function
                .params
                .iter()
                .enumerate()
                .map(|(i, (_, ty))| format!("{} %{}", ty, i))
                .collect::<Vec<_>>();

            match function.data() {
                None => {
                    let params = function
                        .params
                        .iter()
                        .map(|(_, ty)| ty.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    writeln!(f, "declare {} @{}({})", ret, function.name, params)?;
                }
                Some(data) => {
                    writeln!(f, "define {} @{}({}) {{", ret, function.name, params.join(", "))?;
                    for block in &data.blocks {
                        writeln!(f, "{}:", block.id)?;
                        for instr in &block.instrs {
                            write!(f, "  ")?;
                            if let Some(result) = instr.result {
                                write!(f, "{} = ", result)?;
                            }
                            writeln!(f, "{}", instr.kind)?;
                        }
                        match &block.terminator {
                            Some(terminator) => writeln!(f, "  {}", terminator)?,
                            None => writeln!(f, "  <missing terminator>")?,
                        }
                    }
                    writeln!(f, "}}")?;
                }
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

impl fmt::Display for InstrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrKind::ConstInt(value) => write!(f, "const i32 {}", value),
            InstrKind::ConstBool(value) => write!(f, "const i1 {}", value),
            InstrKind::ConstByte(value) => write!(f, "const i8 {}", value),
            InstrKind::ConstNull(ty) => write!(f, "const {} null", ty),
            InstrKind::Binary { op, lhs, rhs } => write!(f, "{} {}, {}", op, lhs, rhs),
            InstrKind::Icmp { cond, lhs, rhs } => write!(f, "icmp {} {}, {}", cond, lhs, rhs),
            InstrKind::Not(value) => write!(f, "not {}", value),
            InstrKind::Bitcast { value, ty } => write!(f, "bitcast {} to {}", value, ty),
            InstrKind::GetElementPtr { base, index } => {
                write!(f, "getelementptr {}, {}", base, index)
            }
            InstrKind::Load { address } => write!(f, "load {}", address),
            InstrKind::Store { address, value } => write!(f, "store {}, {}", value, address),
            InstrKind::Alloca(ty) => write!(f, "alloca {}", ty),
            InstrKind::Call { callee, args } => {
                write!(f, "call @{}(", callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            InstrKind::GlobalAddr(name) => write!(f, "globaladdr @{}", name),
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Br(target) => write!(f, "br {}", target),
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => write!(f, "br {}, {}, {}", cond, then_block, else_block),
            Terminator::Ret(Some(value)) => write!(f, "ret {}", value),
            Terminator::Ret(None) => write!(f, "ret void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display_and_size() {
        let ty = IrType::I32.ptr().ptr();
        assert_eq!(ty.to_string(), "i32**");
        assert_eq!(ty.size(), 8);
        assert_eq!(ty.pointee().unwrap().to_string(), "i32*");
        assert_eq!(IrType::I1.size(), 1);
        assert_eq!(IrType::I32.size(), 4);
    }

    #[test]
    fn test_module_dump_contains_declarations() {
        let mut builder = ModuleBuilder::new();
        builder.declare_global("x", IrType::I32);
        builder.declare_function("writeln", vec![("value".into(), IrType::I32)], None);

        let module = builder.finish();
        let dump = module.to_string();
        assert!(dump.contains("@x = global i32 zeroinitializer"));
        assert!(dump.contains("declare void @writeln(i32)"));
    }
}
