//! x86-64 (SysV) assembly emission.
//!
//! Every SSA value gets an 8-byte frame slot and every alloca gets an
//! 8-byte cell; instructions load their operands from slots, compute
//! through `%rax`/`%rcx`, and spill the result back. Access width
//! follows the value's type: i32 values use 32-bit moves, i1/i8 and
//! pointers use full-width moves with the slot normalized on write.
//!
//! Frames are 16-byte aligned, so `%rsp` is correctly aligned at every
//! call site; arguments beyond the six integer registers go on the
//! stack padded to keep that alignment.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::ir::{
    BinaryOp, Function, FunctionData, IcmpCond, InstrKind, IrType, Module, Terminator, ValueId,
};

const ARG_REGS_64: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];
const ARG_REGS_32: [&str; 6] = ["%edi", "%esi", "%edx", "%ecx", "%r8d", "%r9d"];

/// Emit the whole module as AT&T assembly.
pub fn emit<W: Write>(module: &Module, output: &mut W) -> io::Result<()> {
    for global in &module.globals {
        writeln!(output, ".lcomm {}, {}", global.name, global.ty.size())?;
    }

    writeln!(output, ".text")?;

    for function in &module.functions {
        if let Some(data) = function.data() {
            emit_function(function, data, output)?;
        }
    }

    Ok(())
}

struct Frame<'a> {
    function: &'a Function,
    data: &'a FunctionData,
    /// Frame offset of each value's spill slot.
    value_offsets: Vec<i32>,
    /// Frame offset of each alloca's cell, keyed by the alloca result.
    cell_offsets: HashMap<ValueId, i32>,
    frame_size: i32,
}

impl<'a> Frame<'a> {
    fn new(function: &'a Function, data: &'a FunctionData) -> Self {
        let mut next = 0;
        let mut cell_offsets = HashMap::new();
        for block in &data.blocks {
            for instr in &block.instrs {
                if let (Some(result), InstrKind::Alloca(_)) = (instr.result, &instr.kind) {
                    next += 8;
                    cell_offsets.insert(result, -next);
                }
            }
        }

        let mut value_offsets = Vec::with_capacity(data.values.len());
        for _ in &data.values {
            next += 8;
            value_offsets.push(-next);
        }

        // Keep %rsp 16-byte aligned after the prologue.
        let frame_size = (next + 15) & !15;

        Self {
            function,
            data,
            value_offsets,
            cell_offsets,
            frame_size,
        }
    }

    fn slot(&self, value: ValueId) -> String {
        format!("{}(%rbp)", self.value_offsets[value.0 as usize])
    }

    fn ty(&self, value: ValueId) -> &IrType {
        &self.data.values[value.0 as usize]
    }

    fn label(&self, block: crate::ir::BlockId) -> String {
        format!(".L{}.{}", self.function.name, block.0)
    }
}

fn emit_function<W: Write>(
    function: &Function,
    data: &FunctionData,
    output: &mut W,
) -> io::Result<()> {
    let frame = Frame::new(function, data);

    writeln!(output, ".globl {}", function.name)?;
    writeln!(output, "{}:", function.name)?;
    writeln!(output, "\tpushq %rbp")?;
    writeln!(output, "\tmovq %rsp, %rbp")?;
    if frame.frame_size > 0 {
        writeln!(output, "\tsubq ${}, %rsp", frame.frame_size)?;
    }

    // Spill incoming parameters into their value slots.
    for (index, (_, ty)) in function.params.iter().enumerate() {
        let slot = frame.slot(ValueId(index as u32));
        if index < 6 {
            match ty {
                IrType::I32 => writeln!(output, "\tmovl {}, {}", ARG_REGS_32[index], slot)?,
                _ => writeln!(output, "\tmovq {}, {}", ARG_REGS_64[index], slot)?,
            }
        } else {
            let incoming = 16 + 8 * (index as i32 - 6);
            writeln!(output, "\tmovq {}(%rbp), %rax", incoming)?;
            writeln!(output, "\tmovq %rax, {}", slot)?;
        }
    }

    for block in &data.blocks {
        writeln!(output, "{}:", frame.label(block.id))?;

        for instr in &block.instrs {
            emit_instr(&frame, instr, output)?;
        }

        match block
            .terminator
            .as_ref()
            .unwrap_or_else(|| unreachable!("verifier requires terminators"))
        {
            Terminator::Br(target) => {
                writeln!(output, "\tjmp {}", frame.label(*target))?;
            }
            Terminator::CondBr {
                cond,
                then_block,
                else_block,
            } => {
                writeln!(output, "\tcmpq $0, {}", frame.slot(*cond))?;
                writeln!(output, "\tjne {}", frame.label(*then_block))?;
                writeln!(output, "\tjmp {}", frame.label(*else_block))?;
            }
            Terminator::Ret(value) => {
                match value {
                    Some(value) => match frame.ty(*value) {
                        IrType::I32 => writeln!(output, "\tmovl {}, %eax", frame.slot(*value))?,
                        _ => writeln!(output, "\tmovq {}, %rax", frame.slot(*value))?,
                    },
                    // The synthesized main returns void at the language
                    // level but is the process entry, so give the C
                    // runtime a clean exit status.
                    None if function.name == "main" => writeln!(output, "\txorl %eax, %eax")?,
                    None => {}
                }
                writeln!(output, "\tleave")?;
                writeln!(output, "\tret")?;
            }
        }
    }

    Ok(())
}

fn emit_instr<W: Write>(frame: &Frame, instr: &crate::ir::Instr, output: &mut W) -> io::Result<()> {
    let dst = |value: Option<ValueId>| -> String {
        match value {
            Some(value) => frame.slot(value),
            None => unreachable!("instruction without a result slot"),
        }
    };

    match &instr.kind {
        InstrKind::ConstInt(value) => {
            writeln!(output, "\tmovq ${}, {}", value, dst(instr.result))?;
        }
        InstrKind::ConstBool(value) => {
            writeln!(output, "\tmovq ${}, {}", u8::from(*value), dst(instr.result))?;
        }
        InstrKind::ConstByte(value) => {
            writeln!(output, "\tmovq ${}, {}", value, dst(instr.result))?;
        }
        InstrKind::ConstNull(_) => {
            writeln!(output, "\tmovq $0, {}", dst(instr.result))?;
        }

        InstrKind::Binary { op, lhs, rhs } => {
            writeln!(output, "\tmovl {}, %eax", frame.slot(*lhs))?;
            match op {
                BinaryOp::Add => writeln!(output, "\taddl {}, %eax", frame.slot(*rhs))?,
                BinaryOp::Sub => writeln!(output, "\tsubl {}, %eax", frame.slot(*rhs))?,
                BinaryOp::Mul => writeln!(output, "\timull {}, %eax", frame.slot(*rhs))?,
                BinaryOp::Sdiv => {
                    writeln!(output, "\tcltd")?;
                    writeln!(output, "\tidivl {}", frame.slot(*rhs))?;
                }
            }
            writeln!(output, "\tmovl %eax, {}", dst(instr.result))?;
        }

        InstrKind::Icmp { cond, lhs, rhs } => {
            match frame.ty(*lhs) {
                IrType::I32 => {
                    writeln!(output, "\tmovl {}, %eax", frame.slot(*lhs))?;
                    writeln!(output, "\tcmpl {}, %eax", frame.slot(*rhs))?;
                }
                _ => {
                    writeln!(output, "\tmovq {}, %rax", frame.slot(*lhs))?;
                    writeln!(output, "\tcmpq {}, %rax", frame.slot(*rhs))?;
                }
            }
            let set = match cond {
                IcmpCond::Eq => "sete",
                IcmpCond::Ne => "setne",
                IcmpCond::Slt => "setl",
                IcmpCond::Sle => "setle",
                IcmpCond::Sgt => "setg",
                IcmpCond::Sge => "setge",
            };
            writeln!(output, "\t{} %al", set)?;
            writeln!(output, "\tmovzbq %al, %rax")?;
            writeln!(output, "\tmovq %rax, {}", dst(instr.result))?;
        }

        InstrKind::Not(value) => {
            writeln!(output, "\tmovq {}, %rax", frame.slot(*value))?;
            writeln!(output, "\txorq $1, %rax")?;
            writeln!(output, "\tmovq %rax, {}", dst(instr.result))?;
        }

        InstrKind::Bitcast { value, .. } => {
            writeln!(output, "\tmovq {}, %rax", frame.slot(*value))?;
            writeln!(output, "\tmovq %rax, {}", dst(instr.result))?;
        }

        InstrKind::GetElementPtr { base, index } => {
            let cell = frame
                .ty(*base)
                .pointee()
                .unwrap_or_else(|| unreachable!("verifier requires pointer bases"))
                .size();
            writeln!(output, "\tmovq {}, %rax", frame.slot(*base))?;
            writeln!(output, "\tmovslq {}, %rcx", frame.slot(*index))?;
            writeln!(output, "\timulq ${}, %rcx, %rcx", cell)?;
            writeln!(output, "\taddq %rcx, %rax")?;
            writeln!(output, "\tmovq %rax, {}", dst(instr.result))?;
        }

        InstrKind::Load { address } => {
            writeln!(output, "\tmovq {}, %rax", frame.slot(*address))?;
            let cell = frame
                .ty(*address)
                .pointee()
                .unwrap_or_else(|| unreachable!("verifier requires pointer addresses"));
            match cell.size() {
                1 => {
                    writeln!(output, "\tmovzbq (%rax), %rax")?;
                    writeln!(output, "\tmovq %rax, {}", dst(instr.result))?;
                }
                4 => {
                    writeln!(output, "\tmovl (%rax), %eax")?;
                    writeln!(output, "\tmovl %eax, {}", dst(instr.result))?;
                }
                _ => {
                    writeln!(output, "\tmovq (%rax), %rax")?;
                    writeln!(output, "\tmovq %rax, {}", dst(instr.result))?;
                }
            }
        }

        InstrKind::Store { address, value } => {
            writeln!(output, "\tmovq {}, %rax", frame.slot(*address))?;
            let cell = frame
                .ty(*address)
                .pointee()
                .unwrap_or_else(|| unreachable!("verifier requires pointer addresses"));
            match cell.size() {
                1 => {
                    writeln!(output, "\tmovq {}, %rcx", frame.slot(*value))?;
                    writeln!(output, "\tmovb %cl, (%rax)")?;
                }
                4 => {
                    writeln!(output, "\tmovl {}, %ecx", frame.slot(*value))?;
                    writeln!(output, "\tmovl %ecx, (%rax)")?;
                }
                _ => {
                    writeln!(output, "\tmovq {}, %rcx", frame.slot(*value))?;
                    writeln!(output, "\tmovq %rcx, (%rax)")?;
                }
            }
        }

        InstrKind::Alloca(_) => {
            let offset = frame.cell_offsets[&instr.result.unwrap_or_else(|| {
                unreachable!("alloca always produces a value")
            })];
            writeln!(output, "\tleaq {}(%rbp), %rax", offset)?;
            writeln!(output, "\tmovq %rax, {}", dst(instr.result))?;
        }

        InstrKind::GlobalAddr(name) => {
            writeln!(output, "\tleaq {}(%rip), %rax", name)?;
            writeln!(output, "\tmovq %rax, {}", dst(instr.result))?;
        }

        InstrKind::Call { callee, args } => {
            // Stack arguments first, padded to a 16-byte multiple.
            let stack_args = args.len().saturating_sub(6);
            let padded = stack_args + (stack_args & 1);
            if stack_args > 0 {
                writeln!(output, "\tsubq ${}, %rsp", 8 * padded)?;
                for (position, arg) in args[6..].iter().enumerate() {
                    writeln!(output, "\tmovq {}, %rax", frame.slot(*arg))?;
                    writeln!(output, "\tmovq %rax, {}(%rsp)", 8 * position)?;
                }
            }

            for (position, arg) in args.iter().take(6).enumerate() {
                match frame.ty(*arg) {
                    IrType::I32 => {
                        writeln!(output, "\tmovl {}, {}", frame.slot(*arg), ARG_REGS_32[position])?
                    }
                    _ => writeln!(output, "\tmovq {}, {}", frame.slot(*arg), ARG_REGS_64[position])?,
                }
            }

            writeln!(output, "\tcall {}", callee)?;

            if stack_args > 0 {
                writeln!(output, "\taddq ${}, %rsp", 8 * padded)?;
            }

            if let Some(result) = instr.result {
                match frame.ty(result) {
                    IrType::I32 => writeln!(output, "\tmovl %eax, {}", frame.slot(result))?,
                    IrType::I1 | IrType::I8 => {
                        writeln!(output, "\tmovzbq %al, %rax")?;
                        writeln!(output, "\tmovq %rax, {}", frame.slot(result))?;
                    }
                    IrType::Ptr(_) => writeln!(output, "\tmovq %rax, {}", frame.slot(result))?,
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, ModuleBuilder};

    fn assemble(module: &Module) -> String {
        let mut buffer = Vec::new();
        emit(module, &mut buffer).expect("emission failed");
        String::from_utf8(buffer).expect("assembly is not UTF-8")
    }

    #[test]
    fn test_globals_become_bss() {
        let mut mb = ModuleBuilder::new();
        mb.declare_global("flag", IrType::I1);
        mb.declare_global("count", IrType::I32);
        mb.declare_global("cells", IrType::I32.ptr());

        let asm = assemble(&mb.finish());
        assert!(asm.contains(".lcomm flag, 1"));
        assert!(asm.contains(".lcomm count, 4"));
        assert!(asm.contains(".lcomm cells, 8"));
    }

    #[test]
    fn test_main_returns_zero_exit_status() {
        let mut mb = ModuleBuilder::new();
        let mut fb = FunctionBuilder::new("main", vec![], None);
        fb.ret(None);
        mb.define_function(fb.finish());

        let asm = assemble(&mb.finish());
        assert!(asm.contains(".globl main"));
        assert!(asm.contains("xorl %eax, %eax"));
        assert!(asm.contains("leave"));
    }

    #[test]
    fn test_call_loads_integer_args_into_registers() {
        let mut mb = ModuleBuilder::new();
        mb.declare_function("writeln", vec![("value".into(), IrType::I32)], None);

        let mut fb = FunctionBuilder::new("main", vec![], None);
        let value = fb.const_int(42);
        fb.call("writeln", vec![value], None);
        fb.ret(None);
        mb.define_function(fb.finish());

        let asm = assemble(&mb.finish());
        assert!(asm.contains("%edi"));
        assert!(asm.contains("call writeln"));
    }

    #[test]
    fn test_branches_use_function_local_labels() {
        let mut mb = ModuleBuilder::new();
        let mut fb = FunctionBuilder::new("main", vec![], None);
        let cond = fb.const_bool(true);
        let then_block = fb.create_block();
        let else_block = fb.create_block();
        fb.cond_br(cond, then_block, else_block);
        fb.switch_to(then_block);
        fb.ret(None);
        fb.switch_to(else_block);
        fb.ret(None);
        mb.define_function(fb.finish());

        let asm = assemble(&mb.finish());
        assert!(asm.contains(".Lmain.0:"));
        assert!(asm.contains("jne .Lmain.1"));
        assert!(asm.contains("jmp .Lmain.2"));
    }

    #[test]
    fn test_frame_is_sixteen_byte_aligned() {
        let mut mb = ModuleBuilder::new();
        let mut fb = FunctionBuilder::new("main", vec![], None);
        let _ = fb.const_int(1);
        fb.ret(None);
        mb.define_function(fb.finish());

        let asm = assemble(&mb.finish());
        assert!(asm.contains("subq $16, %rsp"));
    }
}
