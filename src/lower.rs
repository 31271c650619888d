use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use crate::ast::stringify::type_name;
use crate::ast::Binop;
use crate::ir::{Inst, IrProgram, Operand};

const SLOT_SIZE: i32 = 8;

/// Registers for the first call arguments (System V order). Calls with more
/// arguments are rejected.
const ARG_REGISTERS: [Register; 2] = [Register::Rdi, Register::Rsi];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Rax,
    Rbx,
    Rdi,
    Rsi,
}

impl Register {
    fn as_str(self) -> &'static str {
        match self {
            Register::Rax => "rax",
            Register::Rbx => "rbx",
            Register::Rdi => "rdi",
            Register::Rsi => "rsi",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translates an `IrProgram` into a NASM x86-64 listing for a freestanding
/// `_start`. Consumed by `assemble`, so the layout and register state never
/// outlive one program.
pub struct Assembler<W: Write> {
    out: W,
    layout: StackLayout,
    registers: RegisterMap,
    externs: Vec<String>,
    frame_size: i32,
    /// params pushed and not yet popped by a call
    pushed: usize,
}

impl Assembler<BufWriter<File>> {
    /// Opens (truncating) the output file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("could not open output file {}", path.display()))?;
        Ok(Assembler::new(BufWriter::new(file)))
    }
}

impl<W: Write> Assembler<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            layout: StackLayout::new(),
            registers: RegisterMap::new(),
            externs: Vec::new(),
            frame_size: 0,
            pushed: 0,
        }
    }

    /// Writes the whole listing and flushes the sink. Every check happens
    /// before the first byte is written.
    pub fn assemble(mut self, ir: &IrProgram) -> Result<W> {
        self.plan_frame(ir)?;
        self.preamble()?;
        for (i, inst) in ir.insts.iter().enumerate() {
            self.assemble_inst(inst)
                .with_context(|| format!("while assembling instruction {}", i))?;
            writeln!(self.out)?;
        }
        self.epilogue()?;
        self.out.flush()?;
        log::debug!(
            "assembled {} instructions, frame of {} bytes",
            ir.insts.len(),
            self.frame_size
        );
        Ok(self.out)
    }

    /// Pass 1: assign slots, check operands, decide spills.
    fn plan_frame(&mut self, ir: &IrProgram) -> Result<()> {
        for inst in &ir.insts {
            if let Inst::Assign { dest, .. } = inst {
                if self.layout.get(dest).is_none() {
                    self.layout.allocate_var(dest);
                }
            }
        }

        let mut temps: Vec<TempInfo> = Vec::new();
        let mut pending_params = 0;
        let mut has_calls = false;
        for (i, inst) in ir.insts.iter().enumerate() {
            match inst {
                Inst::Param(_) => pending_params += 1,
                Inst::Call { callee, argc, .. } => {
                    has_calls = true;
                    if *argc > ARG_REGISTERS.len() {
                        bail!(
                            "call to {} passes {} arguments, at most {} are supported",
                            describe(callee),
                            argc,
                            ARG_REGISTERS.len()
                        );
                    }
                    if *argc > pending_params {
                        bail!(
                            "call to {} expects {} arguments but {} were passed",
                            describe(callee),
                            argc,
                            pending_params
                        );
                    }
                    pending_params -= argc;
                    match callee {
                        Operand::Name(name) => {
                            if !self.externs.contains(name) {
                                self.externs.push(name.clone());
                            }
                        }
                        Operand::Temp(_) => {}
                        _ => bail!("cannot call {}", describe(callee)),
                    }
                }
                _ => {}
            }
            for src in inst.sources() {
                match src {
                    Operand::Temp(temp) => use_temp(&mut temps, temp, i)?,
                    // a named callee is a label, not a variable
                    Operand::Name(_) if matches!(inst, Inst::Call { .. }) => {}
                    Operand::Name(name) => {
                        if self.layout.get(name).is_none() {
                            bail!("use of undefined variable `{}`", name);
                        }
                    }
                    Operand::Int(_) | Operand::Float(_) => {}
                }
            }
            if let (Some(dest), false) = (inst.dest(), matches!(inst, Inst::Assign { .. })) {
                temps.push(TempInfo {
                    name: dest,
                    def: i,
                    first_use: None,
                });
            }
        }

        // a temp that is not read by the very next instruction would be
        // clobbered in rax before its use
        for temp in &temps {
            if temp.first_use.is_some_and(|used| used != temp.def + 1) {
                self.layout.allocate_spill(temp.name);
            }
        }

        self.frame_size = self.layout.frame_size();
        // keep rsp 16-byte aligned at call sites, `push rbp` already took 8
        if has_calls && self.frame_size % 16 == 0 {
            self.frame_size += SLOT_SIZE;
        }
        Ok(())
    }

    fn preamble(&mut self) -> Result<()> {
        writeln!(self.out, "section .text")?;
        for name in &self.externs {
            writeln!(self.out, "extern {}", name)?;
        }
        writeln!(self.out, "global _start")?;
        writeln!(self.out)?;
        writeln!(self.out, "_start:")?;
        self.emit("push rbp")?;
        self.emit("mov rbp, rsp")?;
        writeln!(self.out)?;
        for (name, offset) in self.layout.slots() {
            writeln!(self.out, "    ; Allocating {} at {}", name, address(offset))?;
        }
        if self.frame_size > 0 {
            writeln!(self.out, "    sub rsp, {}", self.frame_size)?;
            writeln!(self.out)?;
        }
        Ok(())
    }

    /// Pass 2, one instruction.
    fn assemble_inst(&mut self, inst: &Inst) -> Result<()> {
        match inst {
            Inst::Binop { op, lhs, rhs, dest } => {
                let lhs = self.operand(lhs)?;
                let rhs = self.operand(rhs)?;
                let (acc, scratch) = (Register::Rax, Register::Rbx);
                if rhs == acc.as_str() {
                    // the right value is the one in rax, move it out first
                    self.emit(&format!("mov {}, {}", scratch, rhs))?;
                    self.emit(&format!("mov {}, {}", acc, lhs))?;
                } else {
                    self.emit(&format!("mov {}, {}", acc, lhs))?;
                    self.emit(&format!("mov {}, {}", scratch, rhs))?;
                }
                match op {
                    Binop::Add => self.emit("add rax, rbx")?,
                    Binop::Sub => self.emit("sub rax, rbx")?,
                    Binop::Mul => self.emit("imul rax, rbx")?,
                    Binop::Div => {
                        self.emit("cqo")?;
                        self.emit("idiv rbx")?;
                    }
                }
                self.bind_result(dest)?;
            }
            Inst::Assign { src, dest } => {
                let src = self.operand(src)?;
                let dest = self
                    .layout
                    .get(dest)
                    .map(address)
                    .ok_or_else(|| anyhow!("no slot for variable `{}`", dest))?;
                self.emit(&format!("mov rax, {}", src))?;
                self.emit(&format!("mov {}, rax", dest))?;
            }
            Inst::Param(src) => {
                let src = self.operand(src)?;
                self.emit(&format!("mov rax, {}", src))?;
                self.emit("push rax")?;
                self.pushed += 1;
            }
            Inst::Call { callee, argc, dest } => {
                // params were pushed last to first, so they pop in order
                for reg in &ARG_REGISTERS[..*argc] {
                    self.emit(&format!("pop {}", reg))?;
                }
                self.pushed -= argc;
                let target = self.call_target(callee)?;
                // params of an enclosing call still on the stack
                let pad = self.pushed % 2 == 1;
                if pad {
                    self.emit("sub rsp, 8")?;
                }
                self.emit(&format!("call {}", target))?;
                if pad {
                    self.emit("add rsp, 8")?;
                }
                self.bind_result(dest)?;
            }
            Inst::Cast { src, from, to, dest } => {
                // every value is a 64-bit integer here, nothing to convert
                writeln!(self.out, "    ; cast {} -> {}", type_name(*from), type_name(*to))?;
                let src = self.operand(src)?;
                self.emit(&format!("mov rax, {}", src))?;
                self.bind_result(dest)?;
            }
        }
        Ok(())
    }

    fn epilogue(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "    ; Exit program with the value of the last variable as exit code"
        )?;
        match self.layout.last_var {
            Some(offset) => self.emit(&format!("mov rdi, {}", address(offset)))?,
            None => self.emit("xor rdi, rdi")?,
        }
        self.emit("mov rsp, rbp")?;
        self.emit("pop rbp")?;
        self.emit("mov rax, 60")?;
        self.emit("syscall")?;
        Ok(())
    }

    fn emit(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "    {}", line)?;
        Ok(())
    }

    /// results land in rax, spilled temps are stored right away
    fn bind_result(&mut self, dest: &str) -> Result<()> {
        if let Some(offset) = self.layout.get_spill(dest) {
            self.emit(&format!("mov {}, rax", address(offset)))?;
            log::trace!("{} spilled to {}", dest, address(offset));
            return Ok(());
        }
        self.registers.bind(dest, Register::Rax);
        log::trace!("{} bound to rax", dest);
        Ok(())
    }

    fn call_target(&self, callee: &Operand) -> Result<String> {
        let target = match callee {
            Operand::Name(name) => name.clone(),
            // indirect call through a computed value
            Operand::Temp(temp) => match self.registers.get(temp) {
                Some(reg) => reg.to_string(),
                None => format!("qword {}", self.operand(callee)?),
            },
            _ => bail!("cannot call {}", describe(callee)),
        };
        return Ok(target);
    }

    fn operand(&self, operand: &Operand) -> Result<String> {
        let str = match operand {
            Operand::Int(value) => value.to_string(),
            // floats are truncated, all arithmetic is integer
            Operand::Float(value) => (*value as i64).to_string(),
            Operand::Name(name) => self
                .layout
                .get(name)
                .map(address)
                .ok_or_else(|| anyhow!("use of undefined variable `{}`", name))?,
            Operand::Temp(temp) => match self.registers.get(temp) {
                Some(reg) => reg.to_string(),
                None => self
                    .layout
                    .get_spill(temp)
                    .map(address)
                    .ok_or_else(|| anyhow!("temporary `{}` has no value", temp))?,
            },
        };
        return Ok(str);
    }
}

struct TempInfo<'ir> {
    name: &'ir str,
    def: usize,
    first_use: Option<usize>,
}

/// records a read of `name` at `i`, the temporary must already be defined
fn use_temp(temps: &mut [TempInfo], name: &str, i: usize) -> Result<()> {
    let Some(temp) = temps.iter_mut().find(|temp| temp.name == name) else {
        bail!("use of temporary `{}` before it is computed", name);
    };
    temp.first_use.get_or_insert(i);
    Ok(())
}

fn describe(operand: &Operand) -> String {
    match operand {
        Operand::Int(value) => format!("literal {}", value),
        Operand::Float(value) => format!("literal {:?}", value),
        Operand::Name(name) | Operand::Temp(name) => format!("`{}`", name),
    }
}

fn address(offset: i32) -> String {
    if offset < 0 {
        format!("[rbp{}]", offset)
    } else if offset > 0 {
        format!("[rbp+{}]", offset)
    } else {
        "[rbp]".to_string()
    }
}

/// name -> rbp offset, grows down one slot at a time, never shrinks.
/// Variables and spilled temporaries are looked up in separate tables, so a
/// variable may be named like a temporary.
struct StackLayout {
    names: Vec<String>,
    offsets: Vec<i32>,
    spills: Vec<String>,
    spill_offsets: Vec<i32>,
    cur: i32,
    /// slot of the most recently allocated user variable
    last_var: Option<i32>,
}

impl StackLayout {
    fn new() -> Self {
        Self {
            names: vec![],
            offsets: vec![],
            spills: vec![],
            spill_offsets: vec![],
            cur: 0,
            last_var: None,
        }
    }

    fn next_slot(&mut self, name: &str) -> i32 {
        self.cur -= SLOT_SIZE;
        log::trace!("allocated {} at {}", name, address(self.cur));
        return self.cur;
    }

    fn allocate_var(&mut self, name: &str) -> i32 {
        let offset = self.next_slot(name);
        self.names.push(name.to_string());
        self.offsets.push(offset);
        self.last_var = Some(offset);
        return offset;
    }

    fn allocate_spill(&mut self, temp: &str) -> i32 {
        let offset = self.next_slot(temp);
        self.spills.push(temp.to_string());
        self.spill_offsets.push(offset);
        return offset;
    }

    fn get(&self, name: &str) -> Option<i32> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.offsets[i])
    }

    fn get_spill(&self, temp: &str) -> Option<i32> {
        self.spills
            .iter()
            .position(|t| t == temp)
            .map(|i| self.spill_offsets[i])
    }

    /// variables first, then spills, each in allocation order
    fn slots(&self) -> Vec<(String, i32)> {
        let vars = self.names.iter().zip(&self.offsets);
        let spills = self.spills.iter().zip(&self.spill_offsets);
        vars.chain(spills)
            .map(|(name, &offset)| (name.clone(), offset))
            .collect()
    }

    fn frame_size(&self) -> i32 {
        return -self.cur;
    }
}

/// temp -> register currently holding it. Entries are only added or
/// overwritten.
struct RegisterMap {
    temps: Vec<String>,
    regs: Vec<Register>,
}

impl RegisterMap {
    fn new() -> Self {
        Self {
            temps: vec![],
            regs: vec![],
        }
    }

    fn bind(&mut self, temp: &str, reg: Register) {
        match self.temps.iter().position(|t| t == temp) {
            Some(i) => self.regs[i] = reg,
            None => {
                self.temps.push(temp.to_string());
                self.regs.push(reg);
            }
        }
    }

    fn get(&self, temp: &str) -> Option<Register> {
        self.temps
            .iter()
            .position(|t| t == temp)
            .map(|i| self.regs[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::typecheck::typecheck;
    use crate::ast::Type;
    use crate::ir::IrGen;
    use crate::parser::tests::parse;

    fn ir(contents: &str) -> IrProgram {
        let mut ast = parse(contents).expect("syntax error");
        typecheck(&mut ast).expect("type error");
        IrGen::generate(&ast).expect("failed to generate ir")
    }

    fn assemble_ir(ir: &IrProgram) -> Result<String> {
        let out = Assembler::new(Vec::new()).assemble(ir)?;
        Ok(String::from_utf8(out).expect("utf8"))
    }

    fn assemble(contents: &str) -> String {
        assemble_ir(&ir(contents)).expect("failed to assemble")
    }

    /// instruction lines, without indentation, comments or blank lines
    fn code_lines(asm: &str) -> Vec<&str> {
        asm.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with(';'))
            .collect()
    }

    macro_rules! assert_body_eq {
        ($contents:expr, [$($lines:literal),* $(,)?]) => {
            let asm = assemble($contents);
            let code = code_lines(&asm);
            let mut start = code.iter().position(|l| *l == "mov rbp, rsp").expect("no prologue") + 1;
            if code[start].starts_with("sub rsp") {
                start += 1;
            }
            let end = code.iter().rposition(|l| l.starts_with("mov rdi") || *l == "xor rdi, rdi")
                .expect("no epilogue");
            let expected: Vec<&str> = vec![$($lines),*];
            assert_eq!(&code[start..end], expected.as_slice(), "\n{}", asm);
        };
    }

    fn name(s: &str) -> Operand {
        Operand::Name(s.to_string())
    }

    #[test]
    fn let_float_add_full_listing() {
        let asm = assemble("let result = 10.5 + 20.5;");
        assert_eq!(
            asm,
            "section .text\n\
             global _start\n\
             \n\
             _start:\n\
             \x20   push rbp\n\
             \x20   mov rbp, rsp\n\
             \n\
             \x20   ; Allocating result at [rbp-8]\n\
             \x20   sub rsp, 8\n\
             \n\
             \x20   mov rax, 10\n\
             \x20   mov rbx, 20\n\
             \x20   add rax, rbx\n\
             \n\
             \x20   mov rax, rax\n\
             \x20   mov [rbp-8], rax\n\
             \n\
             \x20   ; Exit program with the value of the last variable as exit code\n\
             \x20   mov rdi, [rbp-8]\n\
             \x20   mov rsp, rbp\n\
             \x20   pop rbp\n\
             \x20   mov rax, 60\n\
             \x20   syscall\n"
        );
    }

    #[test]
    fn empty_program_exits_zero() {
        let asm = assemble("");
        let code = code_lines(&asm);
        assert!(!asm.contains("sub rsp"));
        assert!(code.contains(&"xor rdi, rdi"));
        assert_eq!(code.last(), Some(&"syscall"));
    }

    #[test]
    fn slots_in_first_seen_order() {
        let asm = assemble("let a = 1; let b = 2; let a = 3; let c = a;");
        let allocs: Vec<&str> = asm
            .lines()
            .filter(|l| l.contains("; Allocating"))
            .map(str::trim)
            .collect();
        assert_eq!(
            allocs,
            [
                "; Allocating a at [rbp-8]",
                "; Allocating b at [rbp-16]",
                "; Allocating c at [rbp-24]",
            ]
        );
        assert!(asm.contains("sub rsp, 24\n"));
        // exit code comes from the last allocated variable
        assert!(asm.contains("mov rdi, [rbp-24]\n"));
    }

    #[test]
    fn reassignment_reuses_slot() {
        assert_body_eq!(
            "let a = 1; let a = 2;",
            ["mov rax, 1", "mov [rbp-8], rax", "mov rax, 2", "mov [rbp-8], rax"]
        );
    }

    #[test]
    fn all_binops() {
        assert_body_eq!(
            "let a = 7; a - 1; a * 2; a / 3;",
            [
                "mov rax, 7",
                "mov [rbp-8], rax",
                "mov rax, [rbp-8]",
                "mov rbx, 1",
                "sub rax, rbx",
                "mov rax, [rbp-8]",
                "mov rbx, 2",
                "imul rax, rbx",
                "mov rax, [rbp-8]",
                "mov rbx, 3",
                "cqo",
                "idiv rbx",
            ]
        );
    }

    #[test]
    fn right_temp_is_moved_out_of_rax_first() {
        assert_body_eq!(
            "let x = 1 + 2 * 3;",
            [
                "mov rax, 2",
                "mov rbx, 3",
                "imul rax, rbx",
                "mov rbx, rax",
                "mov rax, 1",
                "add rax, rbx",
                "mov rax, rax",
                "mov [rbp-8], rax",
            ]
        );
    }

    #[test]
    fn temp_not_used_next_is_spilled() {
        let asm = assemble("let x = a * b + c * d; let a = 0; let b = 0; let c = 0; let d = 0;");
        assert!(asm.contains("; Allocating t0 at [rbp-48]"), "{}", asm);
        assert_body_eq!(
            "let x = a * b + c * d; let a = 0; let b = 0; let c = 0; let d = 0;",
            [
                "mov rax, [rbp-16]",
                "mov rbx, [rbp-24]",
                "imul rax, rbx",
                "mov [rbp-48], rax",
                "mov rax, [rbp-32]",
                "mov rbx, [rbp-40]",
                "imul rax, rbx",
                "mov rbx, rax",
                "mov rax, [rbp-48]",
                "add rax, rbx",
                "mov rax, rax",
                "mov [rbp-8], rax",
                "mov rax, 0",
                "mov [rbp-16], rax",
                "mov rax, 0",
                "mov [rbp-24], rax",
                "mov rax, 0",
                "mov [rbp-32], rax",
                "mov rax, 0",
                "mov [rbp-40], rax",
            ]
        );
    }

    #[test]
    fn variable_named_like_spilled_temp() {
        let src = "let t0 = 5; let a = 1; let b = 2; let c = 3; let d = 4; let x = a * b + c * d;";
        let asm = assemble(src);
        assert!(asm.contains("    ; Allocating t0 at [rbp-8]\n"), "{}", asm);
        assert!(asm.contains("    ; Allocating t0 at [rbp-56]\n"), "{}", asm);
        // only `let t0 = 5` writes the variable
        assert_eq!(asm.matches("mov [rbp-8], rax").count(), 1, "{}", asm);
        assert_body_eq!(
            src,
            [
                "mov rax, 5",
                "mov [rbp-8], rax",
                "mov rax, 1",
                "mov [rbp-16], rax",
                "mov rax, 2",
                "mov [rbp-24], rax",
                "mov rax, 3",
                "mov [rbp-32], rax",
                "mov rax, 4",
                "mov [rbp-40], rax",
                "mov rax, [rbp-16]",
                "mov rbx, [rbp-24]",
                "imul rax, rbx",
                "mov [rbp-56], rax",
                "mov rax, [rbp-32]",
                "mov rbx, [rbp-40]",
                "imul rax, rbx",
                "mov rbx, rax",
                "mov rax, [rbp-56]",
                "add rax, rbx",
                "mov rax, rax",
                "mov [rbp-48], rax",
            ]
        );
    }

    #[test]
    fn variable_named_like_live_temp() {
        assert_body_eq!(
            "let a = 2; let b = 3; let t0 = 5; let x = t0 * (a * b);",
            [
                "mov rax, 2",
                "mov [rbp-8], rax",
                "mov rax, 3",
                "mov [rbp-16], rax",
                "mov rax, 5",
                "mov [rbp-24], rax",
                "mov rax, [rbp-8]",
                "mov rbx, [rbp-16]",
                "imul rax, rbx",
                "mov rbx, rax",
                "mov rax, [rbp-24]",
                "imul rax, rbx",
                "mov rax, rax",
                "mov [rbp-32], rax",
            ]
        );
    }

    #[test]
    fn temp_read_before_computed() {
        let program = IrProgram {
            insts: vec![Inst::Assign {
                src: Operand::Temp("t4".to_string()),
                dest: "x".to_string(),
            }],
        };
        let err = assemble_ir(&program).unwrap_err();
        assert!(err.to_string().contains("before it is computed"), "{}", err);
    }

    #[test]
    fn call_pops_params_in_order() {
        let asm = assemble("let result = my_func(10.5, 20.5);");
        assert!(asm.starts_with("section .text\nextern my_func\nglobal _start\n"), "{}", asm);
        assert_body_eq!(
            "let result = my_func(10.5, 20.5);",
            [
                "mov rax, 20",
                "push rax",
                "mov rax, 10",
                "push rax",
                "pop rdi",
                "pop rsi",
                "call my_func",
                "mov rax, rax",
                "mov [rbp-8], rax",
            ]
        );
    }

    #[test]
    fn frame_is_aligned_for_calls() {
        let asm = assemble("let a = f();");
        assert!(asm.contains("sub rsp, 8\n"), "{}", asm);
        let asm = assemble("let a = 1; let b = f();");
        assert!(asm.contains("sub rsp, 24\n"), "{}", asm);
        let asm = assemble("f();");
        assert!(asm.contains("sub rsp, 8\n"), "{}", asm);
    }

    #[test]
    fn externs_are_deduplicated() {
        let asm = assemble("f(1); g(); f(2);");
        let externs: Vec<&str> = asm.lines().filter(|l| l.starts_with("extern")).collect();
        assert_eq!(externs, ["extern f", "extern g"]);
    }

    #[test]
    fn nested_call_keeps_alignment() {
        assert_body_eq!(
            "f(g(1), 2);",
            [
                "mov rax, 2",
                "push rax",
                "mov rax, 1",
                "push rax",
                "pop rdi",
                "sub rsp, 8",
                "call g",
                "add rsp, 8",
                "mov rax, rax",
                "push rax",
                "pop rdi",
                "pop rsi",
                "call f",
            ]
        );
    }

    #[test]
    fn chained_call_is_indirect() {
        let asm = assemble("f(1)(2);");
        assert!(asm.contains("extern f\n"));
        assert!(!asm.contains("extern t0"));
        assert!(asm.contains("call rax\n"), "{}", asm);
        assert_body_eq!("f()();", ["call f", "call rax"]);
    }

    #[test]
    fn spilled_callee_is_called_through_its_slot() {
        let program = IrProgram {
            insts: vec![
                Inst::Call {
                    callee: name("f"),
                    argc: 0,
                    dest: "t0".to_string(),
                },
                Inst::Assign {
                    src: Operand::Int(1),
                    dest: "x".to_string(),
                },
                Inst::Call {
                    callee: Operand::Temp("t0".to_string()),
                    argc: 0,
                    dest: "t1".to_string(),
                },
            ],
        };
        let asm = assemble_ir(&program).expect("failed to assemble");
        assert!(asm.contains("    ; Allocating t0 at [rbp-16]\n"), "{}", asm);
        assert!(asm.contains("    mov [rbp-16], rax\n"), "{}", asm);
        assert!(asm.contains("    call qword [rbp-16]\n"), "{}", asm);
        // 16 bytes of slots, padded for the call
        assert!(asm.contains("    sub rsp, 24\n"), "{}", asm);
    }

    #[test]
    fn cast_is_a_move() {
        let asm = assemble("let x = (int)2.5;");
        assert!(asm.contains("; cast float -> int"));
        assert_body_eq!(
            "let x = (int)2.5;",
            ["mov rax, 2", "mov rax, rax", "mov [rbp-8], rax"]
        );
    }

    #[test]
    fn too_many_args() {
        let err = assemble_ir(&ir("f(1, 2, 3);")).unwrap_err();
        assert!(err.to_string().contains("at most 2"), "{}", err);
    }

    #[test]
    fn undefined_variable() {
        let err = assemble_ir(&ir("let x = y;")).unwrap_err();
        assert!(err.to_string().contains("undefined variable `y`"), "{}", err);
    }

    #[test]
    fn variable_assigned_later_has_a_slot() {
        assert_body_eq!(
            "x + 1; let x = 2;",
            ["mov rax, [rbp-8]", "mov rbx, 1", "add rax, rbx", "mov rax, 2", "mov [rbp-8], rax"]
        );
    }

    #[test]
    fn literal_callee_is_rejected() {
        let program = IrProgram {
            insts: vec![Inst::Call {
                callee: Operand::Int(3),
                argc: 0,
                dest: "t0".to_string(),
            }],
        };
        let err = assemble_ir(&program).unwrap_err();
        assert!(err.to_string().contains("cannot call literal 3"), "{}", err);
    }

    #[test]
    fn missing_params_are_rejected() {
        let program = IrProgram {
            insts: vec![
                Inst::Param(Operand::Int(1)),
                Inst::Call {
                    callee: name("f"),
                    argc: 2,
                    dest: "t0".to_string(),
                },
            ],
        };
        let err = assemble_ir(&program).unwrap_err();
        assert!(err.to_string().contains("expects 2 arguments"), "{}", err);
    }

    #[test]
    fn nothing_written_on_error() {
        let mut out = Vec::new();
        let res = Assembler::new(&mut out).assemble(&ir("f(1, 2, 3);"));
        assert!(res.is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn cast_types_are_commented() {
        let program = IrProgram {
            insts: vec![Inst::Cast {
                src: Operand::Int(1),
                from: Type::Int,
                to: Type::Float,
                dest: "t0".to_string(),
            }],
        };
        let asm = assemble_ir(&program).expect("failed to assemble");
        assert!(asm.contains("; cast int -> float"));
    }

    #[test]
    fn writes_to_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.s");
        let asm = Assembler::create(&path).expect("create");
        asm.assemble(&ir("let a = 1;")).expect("failed to assemble");
        let contents = std::fs::read_to_string(&path).expect("read");
        assert!(contents.starts_with("section .text\n"));
        assert!(contents.ends_with("syscall\n"));
    }

    #[test]
    fn unopenable_sink() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("out.s");
        let err = Assembler::create(&path).err().expect("expected error");
        assert!(err.to_string().contains("could not open output file"));
    }

    #[test]
    fn address_formatting() {
        assert_eq!(address(-16), "[rbp-16]");
        assert_eq!(address(8), "[rbp+8]");
        assert_eq!(address(0), "[rbp]");
    }

    #[test]
    fn stack_layout_grows_down() {
        let mut layout = StackLayout::new();
        assert_eq!(layout.allocate_var("a"), -8);
        assert_eq!(layout.allocate_spill("t3"), -16);
        assert_eq!(layout.allocate_var("b"), -24);
        assert_eq!(layout.get_spill("t3"), Some(-16));
        assert_eq!(layout.get("t3"), None);
        assert_eq!(layout.get("c"), None);
        assert_eq!(layout.last_var, Some(-24));
        assert_eq!(layout.frame_size(), 24);
    }

    #[test]
    fn register_binding_overwrites() {
        let mut regs = RegisterMap::new();
        regs.bind("t0", Register::Rax);
        regs.bind("t0", Register::Rbx);
        assert_eq!(regs.get("t0"), Some(Register::Rbx));
        assert_eq!(regs.get("t1"), None);
    }
}
