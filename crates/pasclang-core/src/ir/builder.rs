//! Builders for [`Module`]s and their functions.
//!
//! [`ModuleBuilder`] collects globals and function declarations so
//! bodies can be emitted in a second phase, letting any procedure call
//! any other regardless of source order. [`FunctionBuilder`] appends
//! instructions to a current block, tracking the type of every value
//! it creates.

use std::collections::HashMap;

use super::{
    BinaryOp, Block, BlockId, Function, FunctionBody, FunctionData, GlobalVar, IcmpCond, Instr,
    InstrKind, IrType, Module, Terminator, ValueId,
};

/// Builds a [`Module`] in two phases: declarations, then definitions.
#[derive(Default)]
pub struct ModuleBuilder {
    globals: Vec<GlobalVar>,
    functions: Vec<Function>,
    index: HashMap<String, usize>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_global(&mut self, name: impl Into<String>, ty: IrType) {
        self.globals.push(GlobalVar {
            name: name.into(),
            ty,
        });
    }

    /// Declare a function signature. The body stays [`FunctionBody::External`]
    /// until [`define_function`](Self::define_function) replaces it.
    pub fn declare_function(
        &mut self,
        name: impl Into<String>,
        params: Vec<(String, IrType)>,
        ret: Option<IrType>,
    ) {
        let name = name.into();
        self.index.insert(name.clone(), self.functions.len());
        self.functions.push(Function {
            name,
            params,
            ret,
            body: FunctionBody::External,
        });
    }

    /// Install a finished definition over its declaration, or append it
    /// if it was never declared (the synthesized `main`).
    pub fn define_function(&mut self, function: Function) {
        match self.index.get(&function.name) {
            Some(&at) => self.functions[at] = function,
            None => {
                self.index
                    .insert(function.name.clone(), self.functions.len());
                self.functions.push(function);
            }
        }
    }

    pub fn finish(self) -> Module {
        Module {
            globals: self.globals,
            functions: self.functions,
        }
    }
}

/// Emits one function, instruction by instruction.
pub struct FunctionBuilder {
    name: String,
    params: Vec<(String, IrType)>,
    ret: Option<IrType>,
    blocks: Vec<Block>,
    values: Vec<IrType>,
    current: BlockId,
}

impl FunctionBuilder {
    /// Start a function with its entry block current. The parameters
    /// become the first values.
    pub fn new(name: impl Into<String>, params: Vec<(String, IrType)>, ret: Option<IrType>) -> Self {
        let values = params.iter().map(|(_, ty)| ty.clone()).collect();
        Self {
            name: name.into(),
            params,
            ret,
            blocks: vec![Block::new(BlockId(0))],
            values,
            current: BlockId(0),
        }
    }

    /// The value bound to the `index`th parameter.
    pub fn param(&self, index: usize) -> ValueId {
        debug_assert!(index < self.params.len());
        ValueId(index as u32)
    }

    pub fn value_type(&self, value: ValueId) -> &IrType {
        &self.values[value.0 as usize]
    }

    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new(id));
        id
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    // ========================================================================
    // Instructions
    // ========================================================================

    pub fn const_int(&mut self, value: i32) -> ValueId {
        self.push(InstrKind::ConstInt(value), IrType::I32)
    }

    pub fn const_bool(&mut self, value: bool) -> ValueId {
        self.push(InstrKind::ConstBool(value), IrType::I1)
    }

    pub fn const_byte(&mut self, value: u8) -> ValueId {
        self.push(InstrKind::ConstByte(value), IrType::I8)
    }

    pub fn const_null(&mut self, ty: IrType) -> ValueId {
        debug_assert!(ty.is_pointer());
        self.push(InstrKind::ConstNull(ty.clone()), ty)
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.push(InstrKind::Binary { op, lhs, rhs }, IrType::I32)
    }

    pub fn icmp(&mut self, cond: IcmpCond, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.push(InstrKind::Icmp { cond, lhs, rhs }, IrType::I1)
    }

    pub fn not(&mut self, value: ValueId) -> ValueId {
        self.push(InstrKind::Not(value), IrType::I1)
    }

    pub fn bitcast(&mut self, value: ValueId, ty: IrType) -> ValueId {
        self.push(
            InstrKind::Bitcast {
                value,
                ty: ty.clone(),
            },
            ty,
        )
    }

    /// Address of element `index` relative to the pointer `base`.
    pub fn gep(&mut self, base: ValueId, index: ValueId) -> ValueId {
        let ty = self.value_type(base).clone();
        self.push(InstrKind::GetElementPtr { base, index }, ty)
    }

    pub fn load(&mut self, address: ValueId) -> ValueId {
        let ty = match self.value_type(address).pointee() {
            Some(pointee) => pointee.clone(),
            None => unreachable!("load from non-pointer value"),
        };
        self.push(InstrKind::Load { address }, ty)
    }

    pub fn store(&mut self, address: ValueId, value: ValueId) {
        self.emit(Instr {
            result: None,
            kind: InstrKind::Store { address, value },
        });
    }

    pub fn alloca(&mut self, ty: IrType) -> ValueId {
        self.push(InstrKind::Alloca(ty.clone()), ty.ptr())
    }

    /// Call `callee`; `ret` is the callee's return type and decides
    /// whether the call produces a value.
    pub fn call(
        &mut self,
        callee: impl Into<String>,
        args: Vec<ValueId>,
        ret: Option<IrType>,
    ) -> Option<ValueId> {
        let kind = InstrKind::Call {
            callee: callee.into(),
            args,
        };
        match ret {
            Some(ty) => Some(self.push(kind, ty)),
            None => {
                self.emit(Instr { result: None, kind });
                None
            }
        }
    }

    pub fn global_addr(&mut self, name: impl Into<String>, global_ty: IrType) -> ValueId {
        let name = name.into();
        self.push(InstrKind::GlobalAddr(name), global_ty.ptr())
    }

    // ========================================================================
    // Terminators
    // ========================================================================

    pub fn br(&mut self, target: BlockId) {
        self.terminate(Terminator::Br(target));
    }

    pub fn cond_br(&mut self, cond: ValueId, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, value: Option<ValueId>) {
        self.terminate(Terminator::Ret(value));
    }

    pub fn finish(self) -> Function {
        Function {
            name: self.name,
            params: self.params,
            ret: self.ret,
            body: FunctionBody::Defined(FunctionData {
                blocks: self.blocks,
                values: self.values,
            }),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn push(&mut self, kind: InstrKind, ty: IrType) -> ValueId {
        let result = ValueId(self.values.len() as u32);
        self.values.push(ty);
        self.emit(Instr {
            result: Some(result),
            kind,
        });
        result
    }

    fn emit(&mut self, instr: Instr) {
        let block = &mut self.blocks[self.current.index()];
        debug_assert!(block.terminator.is_none(), "emitting into terminated block");
        block.instrs.push(instr);
    }

    fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.blocks[self.current.index()];
        debug_assert!(block.terminator.is_none(), "block already terminated");
        block.terminator = Some(terminator);
    }
}
