//! AST-to-AST passes that run between parsing and code generation.
//!
//! Each transform walks the already-parsed [`Module`] in place. None of them
//! touch the token buffer or re-run any part of the front end; they operate
//! purely on statement/expression ids, matching the reference's approach of
//! running a handful of small tree-rewriting passes over the same
//! pointer-based AST the parser built.
use crate::ast::*;
use crate::string_pool::{StringPool, Symbol};
use crate::types::{BaseKind, BufferKind, RegisterBinding, Type};

/// Marks every statement `hidden`, then walks from `entry0` (and `entry1` if
/// given) to unhide every function, global declaration, struct, and buffer
/// actually reachable — so a later pass (or a generator's own emission loop)
/// can skip dead code without a separate liveness analysis.
pub fn prune_tree(module: &mut Module, entry0: Symbol, entry1: Option<Symbol>) {
    for id in module.statements.iter_ids() {
        module.statements[id].hidden = true;
    }
    for f in module.functions.items.iter_mut() {
        f.hidden = true;
        for arg in f.arguments.iter_mut() {
            arg.hidden = false;
        }
    }

    let mut visited_functions = std::collections::HashSet::new();
    let mut stack = Vec::new();
    for entry in [Some(entry0), entry1].into_iter().flatten() {
        if let Some(id) = find_function_statement(module, entry) {
            stack.push(id);
        }
    }

    while let Some(stmt_id) = stack.pop() {
        module.statements[stmt_id].hidden = false;
        let StatementKind::Function(func_id) = module.statements[stmt_id].kind else {
            continue;
        };
        if !visited_functions.insert(func_id) {
            continue;
        }
        module.functions[func_id].hidden = false;
        if let Some(body) = module.functions[func_id].body {
            let mut called = Vec::new();
            walk_statement_tree(module, body, &mut |m, s| {
                mark_statement_reachable(m, s, &mut called);
            });
            stack.extend(called);
        }
    }
}

fn find_function_statement(module: &Module, name: Symbol) -> Option<Id<Statement>> {
    module.statements().find(|&id| {
        matches!(module.statements[id].kind, StatementKind::Function(_)) && module.statements[id].name == name
    })
}

/// Depth-first walk of a statement's nested statement tree (block bodies,
/// if/for/while/switch sub-bodies), visiting every expression reachable from
/// it via `callback`. Takes `&mut Module` throughout (rather than splitting
/// a read-only traversal from a mutating one) since `prune_tree`'s callback
/// needs to flip `hidden` flags as it goes; the statement kind is cloned
/// before inspecting its children so the callback's mutable borrow never
/// overlaps a live borrow of `module.statements`.
fn walk_statement_tree(module: &mut Module, root: Id<Statement>, callback: &mut impl FnMut(&mut Module, Id<Statement>)) {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        callback(module, id);
        let kind = module.statements[id].kind.clone();
        match kind {
            StatementKind::Block(Some(first)) => stack.extend(statement_chain(module, first)),
            StatementKind::If(s) => {
                if let Some(b) = s.then_branch {
                    stack.push(b);
                }
                for (_, b) in &s.else_ifs {
                    if let Some(b) = b {
                        stack.push(*b);
                    }
                }
                if let Some(b) = s.else_branch {
                    stack.push(b);
                }
            }
            StatementKind::For(s) => {
                if let Some(b) = s.body {
                    stack.push(b);
                }
            }
            StatementKind::While(s) => {
                if let Some(b) = s.body {
                    stack.push(b);
                }
            }
            StatementKind::Switch(s) => {
                for (_, b) in &s.cases {
                    if let Some(b) = b {
                        stack.extend(statement_chain(module, *b));
                    }
                }
                if let Some(b) = s.default {
                    stack.extend(statement_chain(module, b));
                }
            }
            _ => {}
        }
    }
}

fn statement_chain(module: &Module, first: Id<Statement>) -> Vec<Id<Statement>> {
    let mut out = Vec::new();
    let mut cursor = Some(first);
    while let Some(id) = cursor {
        out.push(id);
        cursor = module.statements[id].next;
    }
    out
}

/// For a reachable body statement, unhides the globals/structs/function
/// calls it references and pushes any called function onto the pending
/// work stack.
fn mark_statement_reachable(module: &mut Module, stmt_id: Id<Statement>, stack: &mut Vec<Id<Statement>>) {
    let exprs = match &module.statements[stmt_id].kind {
        StatementKind::Expression(e) => vec![*e],
        StatementKind::Return(Some(e)) => vec![*e],
        StatementKind::Declaration(d) => d.assignment.into_iter().collect(),
        StatementKind::If(s) => {
            let mut v = vec![s.condition];
            v.extend(s.else_ifs.iter().map(|(c, _)| *c));
            v
        }
        StatementKind::For(s) => {
            let mut v: Vec<_> = s.init_expression.into_iter().collect();
            v.extend(s.init_declaration.as_ref().and_then(|(_, d)| d.assignment));
            v.extend(s.condition);
            v.extend(s.increment);
            v
        }
        StatementKind::While(s) => vec![s.condition],
        StatementKind::Switch(s) => s.condition.into_iter().collect(),
        _ => Vec::new(),
    };
    for expr in exprs {
        mark_expr_reachable(module, expr, stack);
    }
}

fn mark_expr_reachable(module: &mut Module, expr_id: Id<Expr>, stack: &mut Vec<Id<Statement>>) {
    let mut work = vec![expr_id];
    while let Some(id) = work.pop() {
        let kind = module.exprs[id].kind.clone();
        match kind {
            ExprKind::Unary { operand, .. } => work.push(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                work.push(lhs);
                work.push(rhs);
            }
            ExprKind::Conditional { condition, if_true, if_false } => {
                work.push(condition);
                work.push(if_true);
                work.push(if_false);
            }
            ExprKind::Cast { operand, .. } => work.push(operand),
            ExprKind::Identifier { name, .. } => {
                if let Some(decl_id) = find_global_declaration(module, name) {
                    if module.statements[decl_id].hidden {
                        module.statements[decl_id].hidden = false;
                        let containing_buffer = match &module.statements[decl_id].kind {
                            StatementKind::Declaration(d) => d.buffer,
                            _ => None,
                        };
                        if let Some(buf) = containing_buffer {
                            module.statements[buf].hidden = false;
                        }
                    }
                }
            }
            ExprKind::Constructor { args, .. } => work.extend(chain(module, args)),
            ExprKind::MemberAccess { object, function_call, .. } => {
                work.push(object);
                work.extend(chain(module, function_call));
            }
            ExprKind::ArrayAccess { array, index } => {
                work.push(array);
                work.push(index);
            }
            ExprKind::FunctionCall { callee_name, args, .. } => {
                work.extend(chain(module, args));
                if let Some(callee_stmt) = find_function_statement(module, callee_name) {
                    stack.push(callee_stmt);
                }
            }
            _ => {}
        }
    }
}

fn chain(module: &Module, head: Option<Id<Expr>>) -> Vec<Id<Expr>> {
    let mut out = Vec::new();
    let mut cursor = head;
    while let Some(id) = cursor {
        out.push(id);
        cursor = module.exprs[id].next;
    }
    out
}

fn find_global_declaration(module: &Module, name: Symbol) -> Option<Id<Statement>> {
    module.statements().find(|&id| {
        matches!(
            module.statements[id].kind,
            StatementKind::Declaration(_) | StatementKind::Struct(_) | StatementKind::Buffer(_)
        ) && module.statements[id].name == name
    })
}

/// Stable-partitions the top-level statement chain into structs, then
/// const-decls/buffers, then everything else, then functions last —
/// preserving relative order within each bucket.
pub fn sort_tree(module: &mut Module) {
    let ids: Vec<_> = module.statements().collect();
    let mut structs = Vec::new();
    let mut consts_and_buffers = Vec::new();
    let mut functions = Vec::new();
    let mut rest = Vec::new();

    for id in ids {
        match &module.statements[id].kind {
            StatementKind::Struct(_) => structs.push(id),
            StatementKind::Buffer(_) => consts_and_buffers.push(id),
            StatementKind::Declaration(d) if d.ty.flags.contains(crate::types::TypeFlags::CONST) => {
                consts_and_buffers.push(id)
            }
            StatementKind::Function(_) => functions.push(id),
            _ => rest.push(id),
        }
    }

    let mut ordered = Vec::new();
    ordered.extend(structs);
    ordered.extend(consts_and_buffers);
    ordered.extend(rest);
    ordered.extend(functions);
    relink(module, &ordered);
}

fn relink(module: &mut Module, ordered: &[Id<Statement>]) {
    module.first_statement = ordered.first().copied();
    for pair in ordered.windows(2) {
        module.statements[pair[0]].next = Some(pair[1]);
    }
    if let Some(&last) = ordered.last() {
        module.statements[last].next = None;
    }
}

/// `PER_ITEM`/`PER_MATERIAL`/no-semantic globals go in a synthetic `b0`
/// buffer, everything else in `b1`; samplers/textures stay loose.
///
/// Mirrors the original's unconditional `register(b0)`/`register(b1)`
/// choice verbatim, including its lack of conflict detection against
/// registers a shader may already bind explicitly — the original author
/// calls this transform "very game-specific"; this crate keeps that
/// behavior for ground-truth compatibility rather than adding a check the
/// reference never had (see `SPEC_FULL.md` §9).
pub fn group_parameters(module: &mut Module, pool: &mut StringPool) {
    let per_item_name = pool.intern("PER_ITEM");
    let per_material_name = pool.intern("PER_MATERIAL");
    let per_instanced_name = pool.intern("PER_INSTANCED_ITEM");

    let ids: Vec<_> = module.statements().collect();
    let mut per_item_fields = Vec::new();
    let mut per_instanced_field = None;
    let mut per_pass_fields = Vec::new();
    let mut untouched = Vec::new();

    for id in ids {
        let is_movable_decl = matches!(module.statements[id].kind, StatementKind::Declaration(_));
        if !is_movable_decl {
            untouched.push(id);
            continue;
        }
        let name = module.statements[id].name;
        let StatementKind::Declaration(decl) = module.statements[id].kind.clone() else { unreachable!() };
        if decl.ty.flags.contains(crate::types::TypeFlags::STATIC)
            || decl.ty.flags.contains(crate::types::TypeFlags::CONST)
            || decl.ty.base.is_texture()
            || decl.ty.base.is_sampler()
        {
            untouched.push(id);
            continue;
        }
        if decl.semantic == Some(per_instanced_name) {
            per_instanced_field = Some((name, decl));
        } else if decl.semantic.is_none() || decl.semantic == Some(per_item_name) || decl.semantic == Some(per_material_name) {
            per_item_fields.push((name, decl));
        } else {
            per_pass_fields.push((name, decl));
        }
    }
    if let Some(field) = per_instanced_field {
        per_item_fields.push(field);
    }

    let mut new_statements = Vec::new();
    if !per_item_fields.is_empty() {
        new_statements.push(make_cbuffer_statement(module, pool, "per_item", 0, per_item_fields));
    }
    if !per_pass_fields.is_empty() {
        new_statements.push(make_cbuffer_statement(module, pool, "per_pass", 1, per_pass_fields));
    }
    new_statements.extend(untouched);
    relink(module, &new_statements);
}

fn make_cbuffer_statement(
    module: &mut Module,
    pool: &mut StringPool,
    name: &str,
    register_slot: u32,
    fields: Vec<(Symbol, Declaration)>,
) -> Id<Statement> {
    let header = NodeHeader::new(Symbol::EMPTY, 0);
    let mut stmt = Statement::new(
        header,
        StatementKind::Buffer(BufferDecl {
            kind: BufferKind::CBuffer,
            element_type: None,
            user_defined_element_type: None,
            fields,
            is_push_constant: false,
        }),
    );
    stmt.name = pool.intern(name);
    stmt.register = Some(RegisterBinding {
        register: pool.intern(&format!("b{register_slot}")),
        space: None,
    });
    module.statements.push(stmt)
}

/// Marks each unreferenced argument `hidden`, so the generators can drop it
/// from the emitted parameter list (and the MSL generator's class-argument
/// lifting can skip it entirely).
pub fn hide_unused_arguments(module: &mut Module, func_id: Id<Function>) {
    let body = module.functions[func_id].body;
    let mut referenced = std::collections::HashSet::new();
    if let Some(body) = body {
        walk_statement_tree(module, body, &mut |m, s| {
            collect_identifier_names(m, s, &mut referenced);
        });
    }
    for arg in module.functions[func_id].arguments.iter_mut() {
        if !referenced.contains(&arg.name) {
            arg.hidden = true;
        }
    }
}

fn collect_identifier_names(module: &Module, stmt_id: Id<Statement>, names: &mut std::collections::HashSet<Symbol>) {
    let exprs: Vec<Id<Expr>> = match &module.statements[stmt_id].kind {
        StatementKind::Expression(e) => vec![*e],
        StatementKind::Return(Some(e)) => vec![*e],
        StatementKind::Declaration(d) => d.assignment.into_iter().collect(),
        StatementKind::If(s) => {
            let mut v = vec![s.condition];
            v.extend(s.else_ifs.iter().map(|(c, _)| *c));
            v
        }
        StatementKind::For(s) => {
            let mut v: Vec<_> = s.init_expression.into_iter().collect();
            v.extend(s.init_declaration.as_ref().and_then(|(_, d)| d.assignment));
            v.extend(s.condition);
            v.extend(s.increment);
            v
        }
        StatementKind::While(s) => vec![s.condition],
        StatementKind::Switch(s) => s.condition.into_iter().collect(),
        _ => Vec::new(),
    };
    for expr in exprs {
        collect_identifier_names_in_expr(module, expr, names);
    }
}

fn collect_identifier_names_in_expr(module: &Module, expr_id: Id<Expr>, names: &mut std::collections::HashSet<Symbol>) {
    let mut work = vec![expr_id];
    while let Some(id) = work.pop() {
        match &module.exprs[id].kind {
            ExprKind::Unary { operand, .. } => work.push(*operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                work.push(*lhs);
                work.push(*rhs);
            }
            ExprKind::Conditional { condition, if_true, if_false } => {
                work.push(*condition);
                work.push(*if_true);
                work.push(*if_false);
            }
            ExprKind::Cast { operand, .. } => work.push(*operand),
            ExprKind::Identifier { name, .. } => {
                names.insert(*name);
            }
            ExprKind::Constructor { args, .. } => work.extend(chain(module, *args)),
            ExprKind::MemberAccess { object, function_call, .. } => {
                work.push(*object);
                work.extend(chain(module, *function_call));
            }
            ExprKind::ArrayAccess { array, index } => {
                work.push(*array);
                work.push(*index);
            }
            ExprKind::FunctionCall { args, .. } => work.extend(chain(module, *args)),
            _ => {}
        }
    }
}

/// Before every `return` in `entry`'s body (return type `float4`/`half4`/
/// `float`/`half`), injects `if (expr.a < threshold) discard;` — `.a` for
/// the vector case, the bare value for the scalar case.
pub fn emulate_alpha_test(module: &mut Module, pool: &mut StringPool, entry: Symbol, threshold: f32) {
    let Some(stmt_id) = find_function_statement(module, entry) else { return };
    let StatementKind::Function(func_id) = module.statements[stmt_id].kind else { return };
    let is_vector4 = matches!(
        &module.functions[func_id].return_type.base,
        BaseKind::Numeric(n) if n.is_vector() && n.rows == 4
    );
    let is_scalar = matches!(
        &module.functions[func_id].return_type.base,
        BaseKind::Numeric(n) if n.is_scalar()
    );
    if !is_vector4 && !is_scalar {
        return;
    }
    let Some(body) = module.functions[func_id].body else { return };

    let mut return_sites = Vec::new();
    walk_statement_tree(module, body, &mut |m, s| {
        if let StatementKind::Return(Some(_)) = &m.statements[s].kind {
            return_sites.push(s);
        }
    });

    let alpha_field = pool.intern("a");
    for return_id in return_sites {
        let StatementKind::Return(Some(value_expr)) = module.statements[return_id].kind else { continue };
        let header = module.statements[return_id].header.clone();

        let alpha_expr = if is_vector4 {
            module.exprs.push(Expr {
                header: header.clone(),
                ty: Type::scalar(crate::types::ElementKind::Float),
                child: None,
                next: None,
                kind: ExprKind::MemberAccess {
                    object: value_expr,
                    field: alpha_field,
                    is_swizzle: true,
                    is_function_call: false,
                    function_call: None,
                },
            })
        } else {
            value_expr
        };

        let threshold_expr = module.exprs.push(Expr {
            header: header.clone(),
            ty: Type::scalar(crate::types::ElementKind::Float),
            child: None,
            next: None,
            kind: ExprKind::Literal(Literal::Float(threshold)),
        });
        let condition = module.exprs.push(Expr {
            header: header.clone(),
            ty: Type::scalar(crate::types::ElementKind::Bool),
            child: None,
            next: None,
            kind: ExprKind::Binary { op: BinaryOp::Lt, lhs: alpha_expr, rhs: threshold_expr },
        });
        let discard_stmt = module.statements.push(Statement::new(header.clone(), StatementKind::Discard));
        let if_stmt = module.statements.push(Statement::new(
            header,
            StatementKind::If(IfStatement {
                condition,
                then_branch: Some(discard_stmt),
                else_ifs: Vec::new(),
                else_branch: None,
            }),
        ));

        splice_before(module, body, return_id, if_stmt);
    }
}

/// Inserts `new_stmt` immediately before `target` in the statement chain
/// rooted (possibly transitively, through nested blocks) at `root`.
fn splice_before(module: &mut Module, root: Id<Statement>, target: Id<Statement>, new_stmt: Id<Statement>) {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let mut cursor = block_first(module, id);
        let mut prev: Option<Id<Statement>> = None;
        while let Some(c) = cursor {
            if c == target {
                match prev {
                    Some(p) => module.statements[p].next = Some(new_stmt),
                    None => set_block_first(module, id, new_stmt),
                }
                module.statements[new_stmt].next = Some(target);
                return;
            }
            match &module.statements[c].kind {
                StatementKind::If(s) => {
                    if let Some(b) = s.then_branch {
                        stack.push(wrap_as_block_root(b));
                    }
                    for (_, b) in &s.else_ifs {
                        if let Some(b) = b {
                            stack.push(wrap_as_block_root(*b));
                        }
                    }
                    if let Some(b) = s.else_branch {
                        stack.push(wrap_as_block_root(b));
                    }
                }
                StatementKind::For(s) => {
                    if let Some(b) = s.body {
                        stack.push(wrap_as_block_root(b));
                    }
                }
                StatementKind::While(s) => {
                    if let Some(b) = s.body {
                        stack.push(wrap_as_block_root(b));
                    }
                }
                StatementKind::Switch(s) => {
                    for (_, b) in &s.cases {
                        if let Some(b) = b {
                            stack.push(wrap_as_block_root(*b));
                        }
                    }
                    if let Some(b) = s.default {
                        stack.push(wrap_as_block_root(b));
                    }
                }
                _ => {}
            }
            prev = Some(c);
            cursor = module.statements[c].next;
        }
    }
}

/// `splice_before` treats every node as if it had a `Block`-shaped
/// container of a statement chain; a bare (non-`Block`) loop/if body is
/// walked as a one-element chain rooted at itself.
fn wrap_as_block_root(body: Id<Statement>) -> Id<Statement> {
    body
}

fn block_first(module: &Module, id: Id<Statement>) -> Option<Id<Statement>> {
    match &module.statements[id].kind {
        StatementKind::Block(first) => *first,
        _ => Some(id),
    }
}

fn set_block_first(module: &mut Module, id: Id<Statement>, new_first: Id<Statement>) {
    if let StatementKind::Block(first) = &mut module.statements[id].kind {
        *first = Some(new_first);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsics::IntrinsicTable;
    use crate::parser::Parser;
    use crate::token_buffer::TokenBuffer;
    use crate::tokenizer::Tokenizer;

    fn parse(source: &str) -> (Module, StringPool) {
        let mut pool = StringPool::new();
        let file = pool.intern("t.hlsl");
        let tokenizer = Tokenizer::new(source, file, 1, &pool);
        let buffer = TokenBuffer::drain(tokenizer, &mut pool, file);
        let intrinsics = IntrinsicTable::build(&mut pool);
        let module = Parser::parse(buffer, &mut pool, &intrinsics).expect("parses");
        (module, pool)
    }

    #[test]
    fn prune_tree_hides_unreachable_functions() {
        let (mut module, mut pool) = parse(
            "float helper() { return 1.0; } float dead() { return 2.0; } float main() { return helper(); }",
        );
        let main = pool.intern("main");
        prune_tree(&mut module, main, None);

        let mut reachable_names = Vec::new();
        for id in module.statements() {
            if let StatementKind::Function(f) = module.statements[id].kind {
                if !module.statements[id].hidden {
                    reachable_names.push(pool.resolve(module.functions[f].name).to_string());
                }
            }
        }
        assert!(reachable_names.contains(&"main".to_string()));
        assert!(reachable_names.contains(&"helper".to_string()));
        assert!(!reachable_names.contains(&"dead".to_string()));
    }

    #[test]
    fn sort_tree_orders_structs_buffers_then_rest_then_functions() {
        let (mut module, _pool) = parse(
            "float main() { return 0.0; } struct S { float x; }; cbuffer B { float y; }; float z;",
        );
        sort_tree(&mut module);
        let kinds: Vec<_> = module
            .statements()
            .map(|id| std::mem::discriminant(&module.statements[id].kind))
            .collect();
        let struct_pos = kinds.iter().position(|k| *k == std::mem::discriminant(&StatementKind::Struct(Default::default())));
        let func_pos = kinds.iter().position(|k| matches!(module.statements[module.statements().nth(kinds.iter().position(|x| x == k).unwrap()).unwrap()].kind, StatementKind::Function(_)));
        assert!(struct_pos.is_some());
        assert!(func_pos.is_some());
        assert!(struct_pos < func_pos);
    }

    #[test]
    fn hide_unused_arguments_marks_unreferenced_parameter() {
        let (mut module, _pool) = parse("float f(float used, float unused) { return used; }");
        let func_id = module.statements().find_map(|id| match module.statements[id].kind {
            StatementKind::Function(f) => Some(f),
            _ => None,
        }).unwrap();
        hide_unused_arguments(&mut module, func_id);
        assert!(!module.functions[func_id].arguments[0].hidden);
        assert!(module.functions[func_id].arguments[1].hidden);
    }

    #[test]
    fn emulate_alpha_test_injects_discard_before_vector_return() {
        let (mut module, mut pool) = parse("float4 PSMain() : SV_Target { return float4(1,1,1,1); }");
        let entry = pool.intern("PSMain");
        emulate_alpha_test(&mut module, &mut pool, entry, 0.5);

        let func_id = module.statements().find_map(|id| match module.statements[id].kind {
            StatementKind::Function(f) => Some(f),
            _ => None,
        }).unwrap();
        let body = module.functions[func_id].body.unwrap();
        let StatementKind::Block(Some(first)) = &module.statements[body].kind else { panic!() };
        let StatementKind::If(if_stmt) = &module.statements[*first].kind else {
            panic!("expected injected if-discard before the return")
        };
        let then_id = if_stmt.then_branch.unwrap();
        assert!(matches!(module.statements[then_id].kind, StatementKind::Discard));
        let next_id = module.statements[*first].next.unwrap();
        assert!(matches!(module.statements[next_id].kind, StatementKind::Return(Some(_))));
    }

    #[test]
    fn group_parameters_moves_unsemantic_globals_into_per_item_buffer() {
        let (mut module, mut pool) = parse("float4 tint; float main() { return tint.x; }");
        group_parameters(&mut module, &mut pool);
        let per_item = module.statements().find_map(|id| match &module.statements[id].kind {
            StatementKind::Buffer(b) if pool.resolve(module.statements[id].name) == "per_item" => Some(b.clone()),
            _ => None,
        });
        assert!(per_item.is_some());
        assert_eq!(per_item.unwrap().fields.len(), 1);
    }
}
