//! IR optimization passes.
//!
//! Level 0 leaves the module untouched. Level 1 runs a small
//! function-pass pipeline: constant folding, branch simplification on
//! constant conditions, and unreachable-block elimination. Levels
//! above 1 fall back to level 1 with a note.

use std::collections::HashMap;

use crate::diagnostic::Diagnostics;
use crate::ir::{
    BinaryOp, BlockId, FunctionData, IcmpCond, InstrKind, Module, Terminator, ValueId,
};

/// Optimize the module in place at the requested level.
pub fn optimize(module: &mut Module, level: u8, diagnostics: &mut Diagnostics) {
    if level > 1 {
        diagnostics.note("optimization levels higher than 1 are currently equivalent to -O1");
    }
    if level == 0 {
        return;
    }

    for function in &mut module.functions {
        if let crate::ir::FunctionBody::Defined(data) = &mut function.body {
            fold_constants(data);
            simplify_branches(data);
            remove_unreachable_blocks(data);
        }
    }
}

/// A value known at compile time.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Known {
    Int(i32),
    Bool(bool),
}

/// Replace arithmetic, comparisons and nots over constants with
/// constants, iterating until nothing more folds.
fn fold_constants(data: &mut FunctionData) {
    let mut known: HashMap<ValueId, Known> = HashMap::new();

    loop {
        let mut changed = false;

        for block in &mut data.blocks {
            for instr in &mut block.instrs {
                let Some(result) = instr.result else { continue };
                if known.contains_key(&result) {
                    continue;
                }

                let folded = match &instr.kind {
                    InstrKind::ConstInt(value) => Some(Known::Int(*value)),
                    InstrKind::ConstBool(value) => Some(Known::Bool(*value)),

                    InstrKind::Binary { op, lhs, rhs } => {
                        match (known.get(lhs), known.get(rhs)) {
                            (Some(Known::Int(a)), Some(Known::Int(b))) => {
                                fold_binary(*op, *a, *b).map(Known::Int)
                            }
                            _ => None,
                        }
                    }

                    InstrKind::Icmp { cond, lhs, rhs } => {
                        match (known.get(lhs), known.get(rhs)) {
                            (Some(Known::Int(a)), Some(Known::Int(b))) => {
                                Some(Known::Bool(fold_icmp(*cond, *a, *b)))
                            }
                            (Some(Known::Bool(a)), Some(Known::Bool(b))) => match cond {
                                IcmpCond::Eq => Some(Known::Bool(a == b)),
                                IcmpCond::Ne => Some(Known::Bool(a != b)),
                                _ => None,
                            },
                            _ => None,
                        }
                    }

                    InstrKind::Not(value) => match known.get(value) {
                        Some(Known::Bool(value)) => Some(Known::Bool(!value)),
                        _ => None,
                    },

                    _ => None,
                };

                if let Some(value) = folded {
                    let replacement = match value {
                        Known::Int(value) => InstrKind::ConstInt(value),
                        Known::Bool(value) => InstrKind::ConstBool(value),
                    };
                    if instr.kind != replacement {
                        instr.kind = replacement;
                        changed = true;
                    }
                    known.insert(result, value);
                }
            }
        }

        if !changed {
            break;
        }
    }
}

fn fold_binary(op: BinaryOp, lhs: i32, rhs: i32) -> Option<i32> {
    match op {
        BinaryOp::Add => Some(lhs.wrapping_add(rhs)),
        BinaryOp::Sub => Some(lhs.wrapping_sub(rhs)),
        BinaryOp::Mul => Some(lhs.wrapping_mul(rhs)),
        // Division traps at run time; folding a trap away would change
        // observable behavior.
        BinaryOp::Sdiv if rhs != 0 => Some(lhs.wrapping_div(rhs)),
        BinaryOp::Sdiv => None,
    }
}

fn fold_icmp(cond: IcmpCond, lhs: i32, rhs: i32) -> bool {
    match cond {
        IcmpCond::Eq => lhs == rhs,
        IcmpCond::Ne => lhs != rhs,
        IcmpCond::Slt => lhs < rhs,
        IcmpCond::Sle => lhs <= rhs,
        IcmpCond::Sgt => lhs > rhs,
        IcmpCond::Sge => lhs >= rhs,
    }
}

/// Rewrite conditional branches whose condition folded to a constant.
fn simplify_branches(data: &mut FunctionData) {
    let mut known: HashMap<ValueId, bool> = HashMap::new();
    for block in &data.blocks {
        for instr in &block.instrs {
            if let (Some(result), InstrKind::ConstBool(value)) = (instr.result, &instr.kind) {
                known.insert(result, *value);
            }
        }
    }

    for block in &mut data.blocks {
        if let Some(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        }) = &block.terminator
        {
            if let Some(&value) = known.get(cond) {
                let target = if value { *then_block } else { *else_block };
                block.terminator = Some(Terminator::Br(target));
            }
        }
    }
}

/// Drop blocks unreachable from the entry and renumber the rest.
fn remove_unreachable_blocks(data: &mut FunctionData) {
    let mut reachable = vec![false; data.blocks.len()];
    let mut worklist = vec![BlockId(0)];
    while let Some(block) = worklist.pop() {
        if reachable[block.index()] {
            continue;
        }
        reachable[block.index()] = true;

        match &data.blocks[block.index()].terminator {
            Some(Terminator::Br(target)) => worklist.push(*target),
            Some(Terminator::CondBr {
                then_block,
                else_block,
                ..
            }) => {
                worklist.push(*then_block);
                worklist.push(*else_block);
            }
            Some(Terminator::Ret(_)) | None => {}
        }
    }

    if reachable.iter().all(|&r| r) {
        return;
    }

    let mut remap: HashMap<BlockId, BlockId> = HashMap::new();
    let mut kept = Vec::new();
    for (index, block) in std::mem::take(&mut data.blocks).into_iter().enumerate() {
        if reachable[index] {
            let new_id = BlockId(kept.len() as u32);
            remap.insert(block.id, new_id);
            kept.push(block);
        }
    }

    for (index, block) in kept.iter_mut().enumerate() {
        block.id = BlockId(index as u32);
        match &mut block.terminator {
            Some(Terminator::Br(target)) => *target = remap[target],
            Some(Terminator::CondBr {
                then_block,
                else_block,
                ..
            }) => {
                *then_block = remap[then_block];
                *else_block = remap[else_block];
            }
            Some(Terminator::Ret(_)) | None => {}
        }
    }

    data.blocks = kept;
}
