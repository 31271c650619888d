use super::{Inst, IrProgram, Operand};
use crate::ast::stringify::type_name;

/// One line per instruction:
/// `t0 = a + b`, `x = t0`, `t1 = (int) t0`, `param x`, `t2 = call f, 1`
pub fn stringify(ir: &IrProgram) -> String {
    IrStringifier {
        ir,
        str: String::new(),
    }
    ._stringify()
}

struct IrStringifier<'ir> {
    ir: &'ir IrProgram,
    str: String,
}

impl<'ir> IrStringifier<'ir> {
    fn _stringify(mut self) -> String {
        for inst in &self.ir.insts {
            match inst {
                Inst::Binop { op, lhs, rhs, dest } => {
                    self.assign_to(dest);
                    self.write_operand(lhs);
                    self.space();
                    self.write(op.symbol());
                    self.space();
                    self.write_operand(rhs);
                }
                Inst::Assign { src, dest } => {
                    self.assign_to(dest);
                    self.write_operand(src);
                }
                Inst::Cast { src, to, dest, .. } => {
                    self.assign_to(dest);
                    self.write("(");
                    self.write(type_name(*to));
                    self.write(")");
                    self.space();
                    self.write_operand(src);
                }
                Inst::Param(src) => {
                    self.write("param");
                    self.space();
                    self.write_operand(src);
                }
                Inst::Call { callee, argc, dest } => {
                    self.assign_to(dest);
                    self.write("call");
                    self.space();
                    self.write_operand(callee);
                    self.write(", ");
                    self.write(&argc.to_string());
                }
            }
            self.newline();
        }
        return self.str;
    }

    fn write(&mut self, str: &str) {
        self.str.push_str(str);
    }

    fn space(&mut self) {
        self.write(" ");
    }

    fn newline(&mut self) {
        self.write("\n");
    }

    fn assign_to(&mut self, dest: &str) {
        self.write(dest);
        self.write(" = ");
    }

    fn write_operand(&mut self, operand: &Operand) {
        let str = match operand {
            Operand::Int(value) => value.to_string(),
            Operand::Float(value) => format!("{:?}", value),
            Operand::Name(name) | Operand::Temp(name) => name.clone(),
        };
        self.write(&str);
    }
}
