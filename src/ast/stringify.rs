use super::{Ast, EIndex, Expr, Stmt, Type};

/// Renders the program as a box-drawing tree, one node per line.
pub fn print_tree(ast: &Ast) -> String {
    let tree = into_tree(ast);
    let mut out = String::new();
    out.push_str(&tree.data);
    out.push('\n');
    for (i, child) in tree.children.iter().enumerate() {
        let is_last = i == tree.children.len() - 1;
        child.print(&mut out, "", is_last);
    }
    return out;
}

/// One-line form of an expression, e.g. `BinaryOp(+, 1, BinaryOp(*, 2, 3))`
pub fn repr_expr(ast: &Ast, i: EIndex) -> String {
    match ast.exprs[i] {
        Expr::Int(value) => value.to_string(),
        // `{:?}` keeps the point, `2.0` stays distinct from `2`
        Expr::Float(value) => format!("{:?}", value),
        Expr::Ident(name) => ast.get_ident(name).to_string(),
        Expr::Binop { op, lhs, rhs } => format!(
            "BinaryOp({}, {}, {})",
            op.symbol(),
            repr_expr(ast, lhs),
            repr_expr(ast, rhs)
        ),
        Expr::Cast { target, inner } => {
            format!("Cast({}, {})", type_name(target), repr_expr(ast, inner))
        }
        Expr::FunCall { callee, args } => {
            let mut parts = vec![repr_expr(ast, callee)];
            parts.extend(ast.call_args(args).map(|arg| repr_expr(ast, arg)));
            format!("Call({})", parts.join(", "))
        }
    }
}

pub fn type_name(ty: Type) -> &'static str {
    match ty {
        Type::Unknown => "unknown",
        Type::Void => "void",
        Type::Int => "int",
        Type::Float => "float",
    }
}

#[derive(Debug)]
struct TreeNode {
    data: String,
    children: Vec<TreeNode>,
}

impl TreeNode {
    fn new(data: String) -> Self {
        TreeNode {
            data,
            children: vec![],
        }
    }

    fn add_node(&mut self, node: TreeNode) {
        self.children.push(node);
    }

    fn print(&self, out: &mut String, prefix: &str, is_last: bool) {
        out.push_str(prefix);
        out.push_str(if is_last { "└─ " } else { "├─ " });
        out.push_str(&self.data);
        out.push('\n');
        let new_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });

        let last_index = self.children.len().saturating_sub(1);
        for (index, child) in self.children.iter().enumerate() {
            child.print(out, &new_prefix, index == last_index);
        }
    }
}

fn into_tree(ast: &Ast) -> TreeNode {
    let mut root = TreeNode::new("Program".to_string());
    for stmt in &ast.stmts {
        let node = match *stmt {
            Stmt::Let { name, value } => {
                let mut node = TreeNode::new(format!("Let {}", ast.get_ident(name)));
                node.add_node(expr_into_treenode(ast, value));
                node
            }
            Stmt::Expr(value) => {
                let mut node = TreeNode::new("ExprStmt".to_string());
                node.add_node(expr_into_treenode(ast, value));
                node
            }
        };
        root.add_node(node);
    }
    return root;
}

fn expr_into_treenode(ast: &Ast, i: EIndex) -> TreeNode {
    let mut node = TreeNode::new(repr_node(ast, i));
    match ast.exprs[i] {
        Expr::Int(_) | Expr::Float(_) | Expr::Ident(_) => {}
        Expr::Binop { lhs, rhs, .. } => {
            node.add_node(expr_into_treenode(ast, lhs));
            node.add_node(expr_into_treenode(ast, rhs));
        }
        Expr::Cast { inner, .. } => {
            node.add_node(expr_into_treenode(ast, inner));
        }
        Expr::FunCall { callee, args } => {
            node.add_node(expr_into_treenode(ast, callee));
            let mut args_node = TreeNode::new("Args".to_string());
            for arg in ast.call_args(args) {
                args_node.add_node(expr_into_treenode(ast, arg));
            }
            node.add_node(args_node);
        }
    }
    return node;
}

fn repr_node(ast: &Ast, i: EIndex) -> String {
    let label = match ast.exprs[i] {
        Expr::Int(value) => format!("Int {}", value),
        Expr::Float(value) => format!("Float {:?}", value),
        Expr::Ident(name) => format!("Ident {}", ast.get_ident(name)),
        Expr::Binop { op, .. } => format!("BinaryOp {}", op.symbol()),
        Expr::Cast { target, .. } => format!("Cast {}", type_name(target)),
        Expr::FunCall { .. } => "Call".to_string(),
    };
    match ast.type_of(i) {
        Type::Unknown => label,
        ty => format!("{} : {}", label, type_name(ty)),
    }
}
