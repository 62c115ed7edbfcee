//! The recording code builder.
//!
//! The lowerer drives code generation as a value-stack machine, the way
//! the host generation library works: push operands, then emit the
//! operation that consumes them. This implementation records the op
//! stream for a backend (or a test) to replay, and tracks operand types
//! just enough to apply the host's typing of calls, operators, and
//! `range` -- failures surface as structured [`CodeError`]s, never
//! panics.

use gox_common::Pos;

use crate::error::CodeError;
use crate::types::{BasicKind, Signature, Type};

/// One recorded emission step.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Marks the following declarations as synthesized glue.
    Autogen,
    FuncStart { name: String },
    FuncEnd,
    BlockOpen,
    BlockClose,
    Lit { text: String },
    Ref { name: String },
    Member { name: String },
    Call { nargs: usize, ellipsis: bool },
    Binary { op: &'static str },
    Unary { op: &'static str },
    Define { names: Vec<String> },
    Assign { n: usize },
    Return { n: usize },
    RangeStart { define: bool, key: Option<String>, value: Option<String> },
    RangeEnd,
    If,
    Then,
    Else,
    IfEnd,
    /// Error-propagation shorthand: test the error result and return it
    /// from the enclosing function when set.
    ErrProp,
    SliceLit { n: usize },
    CompositeLit { n: usize },
    EndStmt,
}

/// The emission collaborator for one package.
#[derive(Default)]
pub struct CodeBuilder {
    ops: Vec<Op>,
    stack: Vec<Type>,
    /// Result shapes of the functions currently open, innermost last.
    fn_results: Vec<Vec<Type>>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn top_type(&self) -> Option<&Type> {
        self.stack.last()
    }

    /// Whether emission is currently inside a function body.
    pub fn in_func(&self) -> bool {
        !self.fn_results.is_empty()
    }

    /// The result shape of the innermost open function.
    pub fn current_results(&self) -> Option<&[Type]> {
        self.fn_results.last().map(Vec::as_slice)
    }

    pub fn mark_autogen(&mut self) {
        self.ops.push(Op::Autogen);
    }

    pub fn func_start(&mut self, name: &str, sig: &Signature) {
        self.fn_results.push(sig.results.clone());
        self.ops.push(Op::FuncStart {
            name: name.to_string(),
        });
    }

    pub fn func_end(&mut self) {
        self.fn_results.pop();
        self.ops.push(Op::FuncEnd);
    }

    pub fn block_open(&mut self) {
        self.ops.push(Op::BlockOpen);
    }

    pub fn block_close(&mut self) {
        self.ops.push(Op::BlockClose);
    }

    /// Drop statement leftovers back down to `depth`.
    pub fn end_stmt(&mut self, depth: usize) {
        if self.stack.len() > depth {
            self.stack.truncate(depth);
            self.ops.push(Op::EndStmt);
        }
    }

    pub fn push_lit(&mut self, kind: BasicKind, text: &str) {
        self.stack.push(Type::Basic(kind));
        self.ops.push(Op::Lit {
            text: text.to_string(),
        });
    }

    /// Push a reference to a resolved symbol.
    pub fn push_ref(&mut self, name: &str, ty: Type) {
        self.stack.push(ty);
        self.ops.push(Op::Ref {
            name: name.to_string(),
        });
    }

    /// Replace the top of the stack with one of its members.
    pub fn member(&mut self, name: &str, ty: Type) {
        self.stack.pop();
        self.stack.push(ty);
        self.ops.push(Op::Member {
            name: name.to_string(),
        });
    }

    /// Emit a call of the function under `nargs` operands.
    pub fn call(&mut self, nargs: usize, ellipsis: bool, pos: Option<Pos>) -> Result<(), CodeError> {
        if self.stack.len() < nargs + 1 {
            return Err(err("call with missing operands", pos));
        }
        let fun_at = self.stack.len() - nargs - 1;
        let sig = match self.stack[fun_at].signature() {
            Some(sig) => sig.clone(),
            None => {
                return Err(err(
                    format!("cannot call non-function ({})", self.stack[fun_at]),
                    pos,
                ))
            }
        };
        if nargs < sig.required_params() {
            return Err(err("not enough arguments in call", pos));
        }
        if !sig.variadic && nargs > sig.params.len() {
            return Err(err("too many arguments in call", pos));
        }
        self.stack.truncate(fun_at);
        self.stack.extend(sig.results.iter().cloned());
        self.ops.push(Op::Call { nargs, ellipsis });
        Ok(())
    }

    /// Emit a binary operation; `cmp` marks comparisons, which always
    /// produce an untyped bool.
    pub fn binary(&mut self, op: &'static str, cmp: bool, pos: Option<Pos>) -> Result<(), CodeError> {
        let y = self.stack.pop().ok_or_else(|| err("missing operand", pos))?;
        let x = self.stack.pop().ok_or_else(|| err("missing operand", pos))?;
        let result = if cmp {
            Type::Basic(BasicKind::UntypedBool)
        } else {
            merge_operands(&x, &y).ok_or_else(|| {
                err(
                    format!("invalid operation: mismatched types {} and {}", x, y),
                    pos,
                )
            })?
        };
        self.stack.push(result);
        self.ops.push(Op::Binary { op });
        Ok(())
    }

    pub fn unary(&mut self, op: &'static str, pos: Option<Pos>) -> Result<(), CodeError> {
        if self.stack.is_empty() {
            return Err(err("missing operand", pos));
        }
        self.ops.push(Op::Unary { op });
        Ok(())
    }

    /// Emit `names := values`, popping one value per name. Returns the
    /// popped value types in declaration order.
    pub fn define(&mut self, names: Vec<String>, pos: Option<Pos>) -> Result<Vec<Type>, CodeError> {
        if self.stack.len() < names.len() {
            return Err(err("assignment with missing values", pos));
        }
        let at = self.stack.len() - names.len();
        let tys = self.stack.split_off(at);
        self.ops.push(Op::Define { names });
        Ok(tys)
    }

    /// Emit `lhs = rhs` for `n` targets; the stack holds the targets,
    /// then the values.
    pub fn assign(&mut self, n: usize, pos: Option<Pos>) -> Result<(), CodeError> {
        if self.stack.len() < 2 * n {
            return Err(err("assignment with missing values", pos));
        }
        self.stack.truncate(self.stack.len() - 2 * n);
        self.ops.push(Op::Assign { n });
        Ok(())
    }

    pub fn ret(&mut self, n: usize, pos: Option<Pos>) -> Result<(), CodeError> {
        if self.stack.len() < n {
            return Err(err("return with missing values", pos));
        }
        self.stack.truncate(self.stack.len() - n);
        self.ops.push(Op::Return { n });
        Ok(())
    }

    /// Open a `range` loop over the value on top of the stack. Returns
    /// the key/value element types the host assigns the iteration.
    pub fn range_start(
        &mut self,
        define: bool,
        key: Option<String>,
        value: Option<String>,
        pos: Option<Pos>,
    ) -> Result<(Type, Type), CodeError> {
        let x = self.stack.pop().ok_or_else(|| err("missing operand", pos))?;
        let elems = x
            .range_elems()
            .ok_or_else(|| err(format!("cannot range over {}", x), pos))?;
        self.ops.push(Op::RangeStart { define, key, value });
        Ok(elems)
    }

    pub fn range_end(&mut self) {
        self.ops.push(Op::RangeEnd);
    }

    pub fn if_cond(&mut self, pos: Option<Pos>) -> Result<(), CodeError> {
        if self.stack.pop().is_none() {
            return Err(err("missing condition", pos));
        }
        self.ops.push(Op::If);
        Ok(())
    }

    pub fn if_then(&mut self) {
        self.ops.push(Op::Then);
    }

    pub fn if_else(&mut self) {
        self.ops.push(Op::Else);
    }

    pub fn if_end(&mut self) {
        self.ops.push(Op::IfEnd);
    }

    /// Build a slice literal from the `n` elements on top of the stack.
    /// Untyped constant elements adopt their default typed kind.
    pub fn slice_lit(&mut self, n: usize, pos: Option<Pos>) -> Result<(), CodeError> {
        if self.stack.len() < n {
            return Err(err("slice literal with missing elements", pos));
        }
        let at = self.stack.len() - n;
        let mut elem: Option<Type> = None;
        for ty in self.stack.split_off(at) {
            elem = match elem {
                None => Some(ty),
                Some(prev) => Some(merge_operands(&prev, &ty).ok_or_else(|| {
                    err(
                        format!("invalid operation: mismatched types {} and {}", prev, ty),
                        pos,
                    )
                })?),
            };
        }
        let elem = match elem {
            Some(Type::Basic(k)) => Type::Basic(k.default_typed()),
            Some(ty) => ty,
            None => Type::Any,
        };
        self.stack.push(Type::slice(elem));
        self.ops.push(Op::SliceLit { n });
        Ok(())
    }

    /// Build a composite literal of `ty` from the `n` values on top of
    /// the stack.
    pub fn composite_lit(&mut self, n: usize, ty: Type, pos: Option<Pos>) -> Result<(), CodeError> {
        if self.stack.len() < n {
            return Err(err("composite literal with missing elements", pos));
        }
        self.stack.truncate(self.stack.len() - n);
        self.stack.push(ty);
        self.ops.push(Op::CompositeLit { n });
        Ok(())
    }

    /// Emit the error-propagation test over the error value on top of
    /// the stack. Requires the innermost open function to return an
    /// error as its last result.
    pub fn err_prop(&mut self, pos: Option<Pos>) -> Result<(), CodeError> {
        match self.stack.last() {
            Some(Type::Named(n)) if n == "error" => {}
            Some(ty) => {
                return Err(err(
                    format!("cannot propagate non-error value ({})", ty),
                    pos,
                ))
            }
            None => return Err(err("missing operand", pos)),
        }
        let returns_error = matches!(
            self.current_results().and_then(<[Type]>::last),
            Some(Type::Named(n)) if n == "error"
        );
        if !returns_error {
            return Err(err(
                "cannot propagate error: enclosing function does not return an error",
                pos,
            ));
        }
        self.stack.pop();
        self.ops.push(Op::ErrProp);
        Ok(())
    }
}

fn err(msg: impl Into<String>, pos: Option<Pos>) -> CodeError {
    CodeError {
        msg: msg.into(),
        pos,
    }
}

/// The host's operand merging for arithmetic/bitwise operators: equal
/// types stay, untyped constants adopt the typed side, and untyped
/// int/rune/float combine to the wider constant kind.
fn merge_operands(x: &Type, y: &Type) -> Option<Type> {
    if x == y {
        return Some(x.clone());
    }
    match (x, y) {
        (Type::Basic(a), Type::Basic(b)) => {
            if a.is_untyped() && !b.is_untyped() {
                Some(y.clone())
            } else if !a.is_untyped() && b.is_untyped() {
                Some(x.clone())
            } else if a.is_untyped() && b.is_untyped() {
                // both untyped: float wins over rune wins over int
                let rank = |k: BasicKind| match k {
                    BasicKind::UntypedInt => 0,
                    BasicKind::UntypedRune => 1,
                    BasicKind::UntypedFloat => 2,
                    _ => 3,
                };
                if rank(*a) == 3 || rank(*b) == 3 {
                    None
                } else if rank(*a) >= rank(*b) {
                    Some(x.clone())
                } else {
                    Some(y.clone())
                }
            } else {
                None
            }
        }
        _ => None,
    }
}
