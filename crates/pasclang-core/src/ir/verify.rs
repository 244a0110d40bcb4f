//! Module verifier.
//!
//! Checks the structural invariants the backend relies on: unique
//! names, terminated blocks, in-range branch targets, single
//! assignment, and per-instruction operand types. The verifier runs on
//! every module before code generation; a failure means the lowering
//! pass produced something the backend must refuse.

use std::collections::HashSet;

use super::{Function, FunctionData, Instr, InstrKind, IrType, Module, Terminator, ValueId};

/// Verify a whole module. Returns the first violation found.
pub fn verify(module: &Module) -> Result<(), String> {
    let mut names = HashSet::new();
    for global in &module.globals {
        if !names.insert(&global.name) {
            return Err(format!("duplicate global @{}", global.name));
        }
    }

    let mut names = HashSet::new();
    for function in &module.functions {
        if !names.insert(&function.name) {
            return Err(format!("duplicate function @{}", function.name));
        }
    }

    for function in &module.functions {
        if let Some(data) = function.data() {
            FunctionVerifier::new(module, function, data)
                .run()
                .map_err(|e| format!("in function @{}: {}", function.name, e))?;
        }
    }

    Ok(())
}

struct FunctionVerifier<'a> {
    module: &'a Module,
    function: &'a Function,
    data: &'a FunctionData,
    defined: Vec<bool>,
}

impl<'a> FunctionVerifier<'a> {
    fn new(module: &'a Module, function: &'a Function, data: &'a FunctionData) -> Self {
        Self {
            module,
            function,
            data,
            defined: Vec::new(),
        }
    }

    fn run(mut self) -> Result<(), String> {
        let function = self.function;
        let data = self.data;

        if data.blocks.is_empty() {
            return Err("no entry block".to_string());
        }

        if data.values.len() < function.params.len() {
            return Err("value table smaller than parameter list".to_string());
        }
        for (i, (name, ty)) in function.params.iter().enumerate() {
            if &data.values[i] != ty {
                return Err(format!("parameter {} has mismatched value type", name));
            }
        }

        // Single assignment: parameters are defined on entry, every
        // other value by exactly one instruction.
        self.defined = vec![false; data.values.len()];
        for slot in self.defined.iter_mut().take(function.params.len()) {
            *slot = true;
        }
        for block in &data.blocks {
            for instr in &block.instrs {
                if let Some(ValueId(result)) = instr.result {
                    let slot = self
                        .defined
                        .get_mut(result as usize)
                        .ok_or_else(|| format!("result %{} out of range", result))?;
                    if *slot {
                        return Err(format!("%{} defined more than once", result));
                    }
                    *slot = true;
                }
            }
        }

        for block in &data.blocks {
            for instr in &block.instrs {
                self.check_instr(instr)?;
            }

            match &block.terminator {
                None => return Err(format!("block {} has no terminator", block.id)),
                Some(Terminator::Br(target)) => {
                    if target.index() >= data.blocks.len() {
                        return Err(format!("branch to unknown block {}", target));
                    }
                }
                Some(Terminator::CondBr {
                    cond,
                    then_block,
                    else_block,
                }) => {
                    if self.operand(*cond)? != &IrType::I1 {
                        return Err(format!("conditional branch on non-i1 value {}", cond));
                    }
                    for target in [then_block, else_block] {
                        if target.index() >= data.blocks.len() {
                            return Err(format!("branch to unknown block {}", target));
                        }
                    }
                }
                Some(Terminator::Ret(value)) => match (value, &function.ret) {
                    (None, None) => {}
                    (Some(value), Some(ret)) => {
                        if self.operand(*value)? != ret {
                            return Err(format!("return value {} has the wrong type", value));
                        }
                    }
                    (None, Some(_)) => return Err("missing return value".to_string()),
                    (Some(_), None) => return Err("void function returns a value".to_string()),
                },
            }
        }

        Ok(())
    }

    /// Type of an operand, requiring that it is defined somewhere.
    fn operand(&self, value: ValueId) -> Result<&'a IrType, String> {
        match self.defined.get(value.0 as usize) {
            Some(true) => Ok(&self.data.values[value.0 as usize]),
            Some(false) => Err(format!("use of undefined value {}", value)),
            None => Err(format!("use of out-of-range value {}", value)),
        }
    }

    /// Type of an instruction's own result.
    fn result(&self, instr: &Instr) -> Result<&'a IrType, String> {
        let result = instr
            .result
            .ok_or_else(|| format!("instruction `{}` must produce a value", instr.kind))?;
        Ok(&self.data.values[result.0 as usize])
    }

    fn check_instr(&self, instr: &Instr) -> Result<(), String> {
        match &instr.kind {
            InstrKind::ConstInt(_) => {
                if self.result(instr)? != &IrType::I32 {
                    return Err("integer constant must be i32".to_string());
                }
            }
            InstrKind::ConstBool(_) => {
                if self.result(instr)? != &IrType::I1 {
                    return Err("boolean constant must be i1".to_string());
                }
            }
            InstrKind::ConstByte(_) => {
                if self.result(instr)? != &IrType::I8 {
                    return Err("byte constant must be i8".to_string());
                }
            }
            InstrKind::ConstNull(ty) => {
                if !ty.is_pointer() {
                    return Err("null constant of non-pointer type".to_string());
                }
                if self.result(instr)? != ty {
                    return Err("null constant type mismatch".to_string());
                }
            }

            InstrKind::Binary { lhs, rhs, .. } => {
                if self.operand(*lhs)? != &IrType::I32 || self.operand(*rhs)? != &IrType::I32 {
                    return Err(format!("arithmetic on non-i32 operands in `{}`", instr.kind));
                }
                if self.result(instr)? != &IrType::I32 {
                    return Err("arithmetic result must be i32".to_string());
                }
            }

            InstrKind::Icmp { lhs, rhs, .. } => {
                if self.operand(*lhs)? != self.operand(*rhs)? {
                    return Err(format!(
                        "comparison of differently typed operands in `{}`",
                        instr.kind
                    ));
                }
                if self.result(instr)? != &IrType::I1 {
                    return Err("comparison result must be i1".to_string());
                }
            }

            InstrKind::Not(value) => {
                if self.operand(*value)? != &IrType::I1 {
                    return Err("logical not on non-i1 value".to_string());
                }
                if self.result(instr)? != &IrType::I1 {
                    return Err("logical not result must be i1".to_string());
                }
            }

            InstrKind::Bitcast { value, ty } => {
                if !self.operand(*value)?.is_pointer() || !ty.is_pointer() {
                    return Err("bitcast between non-pointer types".to_string());
                }
                if self.result(instr)? != ty {
                    return Err("bitcast result type mismatch".to_string());
                }
            }

            InstrKind::GetElementPtr { base, index } => {
                let base_ty = self.operand(*base)?;
                if !base_ty.is_pointer() {
                    return Err("getelementptr over a non-pointer base".to_string());
                }
                if self.operand(*index)? != &IrType::I32 {
                    return Err("getelementptr index must be i32".to_string());
                }
                if self.result(instr)? != base_ty {
                    return Err("getelementptr result type mismatch".to_string());
                }
            }

            InstrKind::Load { address } => {
                let pointee = self
                    .operand(*address)?
                    .pointee()
                    .ok_or_else(|| "load from non-pointer address".to_string())?;
                if self.result(instr)? != pointee {
                    return Err("load result type mismatch".to_string());
                }
            }

            InstrKind::Store { address, value } => {
                let pointee = self
                    .operand(*address)?
                    .pointee()
                    .ok_or_else(|| "store to non-pointer address".to_string())?;
                if self.operand(*value)? != pointee {
                    return Err("store value type mismatch".to_string());
                }
            }

            InstrKind::Alloca(ty) => {
                if self.result(instr)? != &ty.clone().ptr() {
                    return Err("alloca result must be a pointer to its cell type".to_string());
                }
            }

            InstrKind::Call { callee, args } => {
                let function = self
                    .module
                    .function(callee)
                    .ok_or_else(|| format!("call to unknown function @{}", callee))?;
                if args.len() != function.params.len() {
                    return Err(format!("call to @{} with wrong argument count", callee));
                }
                for (arg, (name, ty)) in args.iter().zip(&function.params) {
                    if self.operand(*arg)? != ty {
                        return Err(format!(
                            "argument {} of call to @{} has the wrong type",
                            name, callee
                        ));
                    }
                }
                match (&function.ret, instr.result) {
                    (Some(ret), Some(result)) => {
                        if &self.data.values[result.0 as usize] != ret {
                            return Err(format!("call to @{} result type mismatch", callee));
                        }
                    }
                    (None, None) => {}
                    (Some(_), None) => {
                        return Err(format!("call to @{} discards its value", callee))
                    }
                    (None, Some(_)) => {
                        return Err(format!("void call to @{} produces a value", callee))
                    }
                }
            }

            InstrKind::GlobalAddr(name) => {
                let global = self
                    .module
                    .global(name)
                    .ok_or_else(|| format!("address of unknown global @{}", name))?;
                if self.result(instr)? != &global.ty.clone().ptr() {
                    return Err(format!("globaladdr @{} result type mismatch", name));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, FunctionBuilder, ModuleBuilder};

    #[test]
    fn test_verifies_well_formed_module() {
        let mut mb = ModuleBuilder::new();
        mb.declare_global("g", IrType::I32);
        mb.declare_function("writeln", vec![("value".into(), IrType::I32)], None);

        let mut fb = FunctionBuilder::new("main", vec![], None);
        let addr = fb.global_addr("g", IrType::I32);
        let value = fb.load(addr);
        let one = fb.const_int(1);
        let sum = fb.binary(BinaryOp::Add, value, one);
        fb.store(addr, sum);
        fb.call("writeln", vec![sum], None);
        fb.ret(None);
        mb.define_function(fb.finish());

        assert_eq!(verify(&mb.finish()), Ok(()));
    }

    #[test]
    fn test_rejects_missing_terminator() {
        let mut mb = ModuleBuilder::new();
        let fb = FunctionBuilder::new("main", vec![], None);
        mb.define_function(fb.finish());

        let error = verify(&mb.finish()).unwrap_err();
        assert!(error.contains("no terminator"));
    }

    #[test]
    fn test_rejects_type_mismatched_store() {
        let mut mb = ModuleBuilder::new();
        let mut fb = FunctionBuilder::new("main", vec![], None);
        let slot = fb.alloca(IrType::I32);
        let flag = fb.const_bool(true);
        fb.store(slot, flag);
        fb.ret(None);
        mb.define_function(fb.finish());

        let error = verify(&mb.finish()).unwrap_err();
        assert!(error.contains("store value type mismatch"));
    }

    #[test]
    fn test_rejects_unknown_callee() {
        let mut mb = ModuleBuilder::new();
        let mut fb = FunctionBuilder::new("main", vec![], None);
        fb.call("missing", vec![], None);
        fb.ret(None);
        mb.define_function(fb.finish());

        let error = verify(&mb.finish()).unwrap_err();
        assert!(error.contains("unknown function @missing"));
    }
}
