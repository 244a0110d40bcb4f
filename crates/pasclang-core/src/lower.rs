//! Lowering from the type-checked AST to backend IR.
//!
//! The value model: `Boolean/0` is i1, `Integer/0` is i32, and a
//! d-dimensional type is d levels of pointer over its scalar. Every
//! local and global lives in a memory slot; reads load and writes
//! store, and the backend promotes slots to registers where
//! profitable. Globals and locals start out false, zero or null.
//!
//! Calls pass scalars and array pointers by value, evaluating actuals
//! left to right. Procedures return void; a function returns whatever
//! its name's slot holds when the body falls off the end.
//!
//! `and`/`or` must not evaluate their right operand once the result is
//! known, so both lower to a result slot plus conditional jumps rather
//! than a bitwise operation.

use std::collections::HashMap;

use crate::context::Context;
use crate::ir::{
    BinaryOp, FunctionBuilder, IcmpCond, IrType, Module, ModuleBuilder, ValueId,
};
use crate::syntax::ast::{BinOp, Expr, ExprKind, Instr, InstrKind, Procedure, Program, UnaryOp};
use crate::types::{Ty, TypeKind};

/// Name of the runtime allocator.
const GC_ALLOC: &str = "__pasclang_gc_alloc";

/// Lower a checked program to an IR module.
pub fn lower(program: &Program, ctx: &Context) -> Module {
    let mut module = ModuleBuilder::new();
    let mut signatures: HashMap<String, (Vec<IrType>, Option<IrType>)> = HashMap::new();

    // Runtime declarations present in every module.
    for (name, params, ret) in [
        ("writeln", vec![IrType::I32], None),
        ("write", vec![IrType::I32], None),
        ("readln", vec![], Some(IrType::I32)),
        (
            GC_ALLOC,
            vec![IrType::I32, IrType::I8],
            Some(IrType::I8.ptr()),
        ),
    ] {
        signatures.insert(name.to_string(), (params.clone(), ret.clone()));
        let params = params
            .into_iter()
            .enumerate()
            .map(|(i, ty)| (format!("arg{}", i), ty))
            .collect();
        module.declare_function(name, params, ret);
    }

    let mut globals = HashMap::new();
    for global in &program.globals {
        let ty = lower_ty(ctx, global.ty.ty);
        globals.insert(global.name.clone(), ty.clone());
        module.declare_global(global.name.clone(), ty);
    }

    // First declare every user procedure, then emit bodies, so source
    // order puts no constraint on call graphs.
    for procedure in &program.procedures {
        let params: Vec<(String, IrType)> = procedure
            .formals
            .iter()
            .map(|f| (f.name.clone(), lower_ty(ctx, f.ty.ty)))
            .collect();
        let ret = procedure.result.map(|r| lower_ty(ctx, r.ty));

        signatures.insert(
            procedure.name.clone(),
            (params.iter().map(|(_, ty)| ty.clone()).collect(), ret.clone()),
        );
        module.declare_function(procedure.name.clone(), params, ret);
    }

    let lowerer = Lowerer {
        ctx,
        signatures,
        globals,
    };

    for procedure in &program.procedures {
        module.define_function(lowerer.lower_procedure(procedure));
    }

    module.define_function(lowerer.lower_main(&program.main));

    module.finish()
}

/// Map an interned type onto the backend lattice.
fn lower_ty(ctx: &Context, ty: Ty) -> IrType {
    let mut lowered = match ctx.types.kind(ty) {
        TypeKind::Boolean => IrType::I1,
        TypeKind::Integer => IrType::I32,
    };
    for _ in 0..ctx.types.dimension(ty) {
        lowered = lowered.ptr();
    }
    lowered
}

struct Lowerer<'a> {
    ctx: &'a Context,
    signatures: HashMap<String, (Vec<IrType>, Option<IrType>)>,
    globals: HashMap<String, IrType>,
}

impl Lowerer<'_> {
    fn lower_procedure(&self, procedure: &Procedure) -> crate::ir::Function {
        let params: Vec<(String, IrType)> = procedure
            .formals
            .iter()
            .map(|f| (f.name.clone(), lower_ty(self.ctx, f.ty.ty)))
            .collect();
        let ret = procedure.result.map(|r| lower_ty(self.ctx, r.ty));

        let mut fb = FunctionBuilder::new(procedure.name.clone(), params.clone(), ret.clone());
        let mut body = BodyLowerer {
            outer: self,
            fb: &mut fb,
            locals: HashMap::new(),
        };

        // Formals are spilled into slots like every other variable; a
        // later pass promotes them back to registers when it pays off.
        for (index, (name, ty)) in params.iter().enumerate() {
            let slot = body.fb.alloca(ty.clone());
            let incoming = body.fb.param(index);
            body.fb.store(slot, incoming);
            body.locals.insert(name.clone(), slot);
        }

        // The function's return value is the slot bound to its name.
        if let Some(ret_ty) = &ret {
            let slot = body.fb.alloca(ret_ty.clone());
            let default = body.default_value(ret_ty.clone());
            body.fb.store(slot, default);
            body.locals.insert(procedure.name.clone(), slot);
        }

        for local in &procedure.locals {
            let ty = lower_ty(self.ctx, local.ty.ty);
            let slot = body.fb.alloca(ty.clone());
            let default = body.default_value(ty);
            body.fb.store(slot, default);
            body.locals.insert(local.name.clone(), slot);
        }

        body.lower_instr(&procedure.body);

        match &ret {
            None => body.fb.ret(None),
            Some(_) => {
                let slot = body.locals[&procedure.name];
                let value = body.fb.load(slot);
                body.fb.ret(Some(value));
            }
        }

        drop(body);
        fb.finish()
    }

    fn lower_main(&self, main: &Instr) -> crate::ir::Function {
        let mut fb = FunctionBuilder::new("main", Vec::new(), None);
        let mut body = BodyLowerer {
            outer: self,
            fb: &mut fb,
            locals: HashMap::new(),
        };

        body.lower_instr(main);
        body.fb.ret(None);

        drop(body);
        fb.finish()
    }
}

struct BodyLowerer<'a, 'b> {
    outer: &'a Lowerer<'a>,
    fb: &'b mut FunctionBuilder,
    locals: HashMap<String, ValueId>,
}

impl BodyLowerer<'_, '_> {
    fn default_value(&mut self, ty: IrType) -> ValueId {
        match ty {
            IrType::I1 => self.fb.const_bool(false),
            IrType::I32 => self.fb.const_int(0),
            IrType::I8 => self.fb.const_byte(0),
            IrType::Ptr(_) => self.fb.const_null(ty),
        }
    }

    /// Address of a named variable: local slot first, then global.
    fn slot(&mut self, name: &str) -> ValueId {
        if let Some(&slot) = self.locals.get(name) {
            return slot;
        }
        let ty = self.outer.globals[name].clone();
        self.fb.global_addr(name, ty)
    }

    fn return_ty(&self, callee: &str) -> Option<IrType> {
        self.outer.signatures[callee].1.clone()
    }

    // ========================================================================
    // Instructions
    // ========================================================================

    fn lower_instr(&mut self, instr: &Instr) {
        match &instr.kind {
            InstrKind::Sequence(instructions) => {
                for instruction in instructions {
                    self.lower_instr(instruction);
                }
            }

            InstrKind::ProcCall { callee, args } => {
                let args = args.iter().map(|arg| self.lower_expr(arg)).collect();
                let ret = self.return_ty(callee);
                self.fb.call(callee.clone(), args, ret);
            }

            InstrKind::VarAssign { name, value } => {
                let value = self.lower_expr(value);
                let slot = self.slot(name);
                let value = self.coerce(value, &self.slot_cell_ty(slot));
                self.fb.store(slot, value);
            }

            InstrKind::ArrayAssign { target, value } => {
                let ExprKind::ArrayAccess { array, index } = &target.kind else {
                    unreachable!("array assignment target is always an array access");
                };

                let value = self.lower_expr(value);
                let base = self.lower_expr(array);
                let index = self.lower_expr(index);
                let address = self.fb.gep(base, index);
                let value = self.coerce(value, &self.slot_cell_ty(address));
                self.fb.store(address, value);
            }

            InstrKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.lower_expr(cond);
                let taken = self.truth_test(cond);

                let then_block = self.fb.create_block();
                let else_block = self.fb.create_block();
                let merge_block = self.fb.create_block();

                self.fb.cond_br(taken, then_block, else_block);

                self.fb.switch_to(then_block);
                self.lower_instr(then_branch);
                self.fb.br(merge_block);

                self.fb.switch_to(else_block);
                if let Some(else_branch) = else_branch {
                    self.lower_instr(else_branch);
                }
                self.fb.br(merge_block);

                self.fb.switch_to(merge_block);
            }

            InstrKind::While { cond, body } => {
                // Tested once before the body and again at its end,
                // jumping back to the loop block or out.
                let cond_value = self.lower_expr(cond);
                let taken = self.truth_test(cond_value);

                let loop_block = self.fb.create_block();
                let end_block = self.fb.create_block();

                self.fb.cond_br(taken, loop_block, end_block);

                self.fb.switch_to(loop_block);
                self.lower_instr(body);
                let again = self.lower_expr(cond);
                let taken = self.truth_test(again);
                self.fb.cond_br(taken, loop_block, end_block);

                self.fb.switch_to(end_block);
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn lower_expr(&mut self, expr: &Expr) -> ValueId {
        match &expr.kind {
            ExprKind::ConstBool(value) => self.fb.const_bool(*value),
            ExprKind::ConstInt(value) => self.fb.const_int(*value),

            ExprKind::VarAccess(name) => {
                let slot = self.slot(name);
                self.fb.load(slot)
            }

            ExprKind::Unary { op, operand } => {
                let operand = self.lower_expr(operand);
                match op {
                    // (-e) is (0 - e)
                    UnaryOp::Minus => {
                        let zero = self.fb.const_int(0);
                        self.fb.binary(BinaryOp::Sub, zero, operand)
                    }
                    UnaryOp::Not => self.fb.not(operand),
                }
            }

            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs),

            ExprKind::Call { callee, args } => {
                let args = args.iter().map(|arg| self.lower_expr(arg)).collect();
                let ret = self.return_ty(callee);
                match self.fb.call(callee.clone(), args, ret) {
                    Some(value) => value,
                    None => unreachable!("function calls always produce a value"),
                }
            }

            ExprKind::ArrayAccess { array, index } => {
                let base = self.lower_expr(array);
                let index = self.lower_expr(index);
                let address = self.fb.gep(base, index);
                self.fb.load(address)
            }

            ExprKind::ArrayAlloc { elem, count } => {
                let count = self.lower_expr(count);

                // Cell tags understood by the runtime allocator:
                // 1 boolean, 2 integer, 3 pointer. The result type has
                // one more dimension than the written element type.
                let tag = if self.outer.ctx.types.dimension(elem.ty) > 0 {
                    3
                } else if self.outer.ctx.types.kind(elem.ty) == TypeKind::Integer {
                    2
                } else {
                    1
                };
                let tag = self.fb.const_byte(tag);

                let raw = match self.fb.call(
                    GC_ALLOC,
                    vec![count, tag],
                    Some(IrType::I8.ptr()),
                ) {
                    Some(value) => value,
                    None => unreachable!("the allocator returns a pointer"),
                };

                let elem_ty = lower_ty(self.outer.ctx, elem.ty);
                self.fb.bitcast(raw, elem_ty.ptr())
            }
        }
    }

    fn lower_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> ValueId {
        let arith = |op| -> Option<BinaryOp> {
            match op {
                BinOp::Add => Some(BinaryOp::Add),
                BinOp::Sub => Some(BinaryOp::Sub),
                BinOp::Mul => Some(BinaryOp::Mul),
                BinOp::Div => Some(BinaryOp::Sdiv),
                _ => None,
            }
        };
        let compare = |op| -> Option<IcmpCond> {
            match op {
                BinOp::LessThan => Some(IcmpCond::Slt),
                BinOp::LessEqual => Some(IcmpCond::Sle),
                BinOp::GreaterThan => Some(IcmpCond::Sgt),
                BinOp::GreaterEqual => Some(IcmpCond::Sge),
                BinOp::Equal => Some(IcmpCond::Eq),
                BinOp::NotEqual => Some(IcmpCond::Ne),
                _ => None,
            }
        };

        if let Some(op) = arith(op) {
            let lhs = self.lower_expr(lhs);
            let rhs = self.lower_expr(rhs);
            return self.fb.binary(op, lhs, rhs);
        }

        if let Some(cond) = compare(op) {
            let lhs = self.lower_expr(lhs);
            let rhs = self.lower_expr(rhs);
            return self.fb.icmp(cond, lhs, rhs);
        }

        match op {
            // a or b:
            //   result := true; if a then done
            //   if b then done; result := false
            BinOp::Or => {
                let result = self.fb.alloca(IrType::I1);
                let initial = self.fb.const_bool(true);
                self.fb.store(result, initial);

                let lhs = self.lower_expr(lhs);

                let next = self.fb.create_block();
                let neither = self.fb.create_block();
                let end = self.fb.create_block();

                self.fb.cond_br(lhs, end, next);

                self.fb.switch_to(next);
                let rhs = self.lower_expr(rhs);
                self.fb.cond_br(rhs, end, neither);

                self.fb.switch_to(neither);
                let falsy = self.fb.const_bool(false);
                self.fb.store(result, falsy);
                self.fb.br(end);

                self.fb.switch_to(end);
                self.fb.load(result)
            }

            // a and b:
            //   result := false; if not a then done
            //   if b then result := true
            BinOp::And => {
                let result = self.fb.alloca(IrType::I1);
                let initial = self.fb.const_bool(false);
                self.fb.store(result, initial);

                let lhs = self.lower_expr(lhs);

                let next = self.fb.create_block();
                let both = self.fb.create_block();
                let end = self.fb.create_block();

                self.fb.cond_br(lhs, next, end);

                self.fb.switch_to(next);
                let rhs = self.lower_expr(rhs);
                self.fb.cond_br(rhs, both, end);

                self.fb.switch_to(both);
                let truthy = self.fb.const_bool(true);
                self.fb.store(result, truthy);
                self.fb.br(end);

                self.fb.switch_to(end);
                self.fb.load(result)
            }

            _ => unreachable!("arithmetic and comparisons handled above"),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Compare a boolean against false, yielding the branch condition.
    fn truth_test(&mut self, value: ValueId) -> ValueId {
        let falsy = self.fb.const_bool(false);
        self.fb.icmp(IcmpCond::Ne, value, falsy)
    }

    /// Cell type behind a slot or computed address.
    fn slot_cell_ty(&self, address: ValueId) -> IrType {
        match self.fb.value_type(address).pointee() {
            Some(pointee) => pointee.clone(),
            None => unreachable!("stores always target pointers"),
        }
    }

    /// Bitcast `value` to the cell type when the pointer layers differ.
    fn coerce(&mut self, value: ValueId, cell_ty: &IrType) -> ValueId {
        if self.fb.value_type(value) != cell_ty {
            self.fb.bitcast(value, cell_ty.clone())
        } else {
            value
        }
    }
}
