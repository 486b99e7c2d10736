use super::ast::TypeName;

/// Parameter type of a built-in. `Any` accepts every non-void value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Exact(TypeName),
    Any,
}

/// World operations the VM implements natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    MoveForward,
    TurnLeft,
    TurnRight,
    IsWall,
    Completed,
    Teleport,
    Print,
}

/// Built-in function: single source of truth for name, signature, AND VM intrinsic.
/// The analyzer seeds its function table from this list and the VM builds its call
/// table from it, so the two cannot drift apart.
#[derive(Debug, Clone)]
pub struct BuiltinFn {
    pub name: &'static str,
    pub params: &'static [(&'static str, ParamType)],
    pub ret: TypeName,
    /// `None` means the analyzer accepts calls but the VM has no implementation.
    pub intrinsic: Option<Intrinsic>,
    pub category: &'static str,
    pub description: &'static str,
}

impl BuiltinFn {
    /// Movement primitives that take no arguments; the compiler refuses any.
    pub fn is_restricted_navigation(&self) -> bool {
        self.category == "navigation" && self.params.is_empty()
    }

    /// Source-style signature, e.g. `void teleport(int x, int y)`.
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|(name, ty)| match ty {
                ParamType::Exact(t) => format!("{t} {name}"),
                ParamType::Any => format!("any {name}"),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} {}({params})", self.ret, self.name)
    }
}

/// All built-in functions available in the DSL.
pub static BUILTINS: &[BuiltinFn] = &[
    // ── Navigation ──────────────────────────────────────────────
    BuiltinFn {
        name: "move_forward", params: &[], ret: TypeName::Bool,
        intrinsic: Some(Intrinsic::MoveForward), category: "navigation",
        description: "Step one cell along the heading. Returns false if a wall blocks the way",
    },
    BuiltinFn {
        name: "turn_left", params: &[], ret: TypeName::Void,
        intrinsic: Some(Intrinsic::TurnLeft), category: "navigation",
        description: "Rotate the heading 90 degrees counter-clockwise",
    },
    BuiltinFn {
        name: "turn_right", params: &[], ret: TypeName::Void,
        intrinsic: Some(Intrinsic::TurnRight), category: "navigation",
        description: "Rotate the heading 90 degrees clockwise",
    },
    // ── Sensors ─────────────────────────────────────────────────
    BuiltinFn {
        name: "is_wall", params: &[], ret: TypeName::Bool,
        intrinsic: Some(Intrinsic::IsWall), category: "sensor",
        description: "True if the cell ahead is a wall",
    },
    BuiltinFn {
        name: "completed", params: &[], ret: TypeName::Bool,
        intrinsic: Some(Intrinsic::Completed), category: "sensor",
        description: "True if the agent stands on the goal cell",
    },
    BuiltinFn {
        name: "next_wall", params: &[], ret: TypeName::Int,
        intrinsic: None, category: "sensor",
        description: "Distance to the next wall ahead (not available at run time)",
    },
    // ── World ───────────────────────────────────────────────────
    BuiltinFn {
        name: "teleport",
        params: &[("x", ParamType::Exact(TypeName::Int)), ("y", ParamType::Exact(TypeName::Int))],
        ret: TypeName::Void,
        intrinsic: Some(Intrinsic::Teleport), category: "world",
        description: "Move the agent to a cell without changing its heading",
    },
    // ── Output ──────────────────────────────────────────────────
    BuiltinFn {
        name: "print", params: &[("value", ParamType::Any)], ret: TypeName::Void,
        intrinsic: Some(Intrinsic::Print), category: "io",
        description: "Append a value to the program output",
    },
];

pub fn lookup_builtin(name: &str) -> Option<&'static BuiltinFn> {
    BUILTINS.iter().find(|b| b.name == name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        for (i, a) in BUILTINS.iter().enumerate() {
            assert!(
                BUILTINS.iter().skip(i + 1).all(|b| b.name != a.name),
                "duplicate builtin {}",
                a.name
            );
        }
    }

    #[test]
    fn next_wall_has_no_intrinsic() {
        let nw = lookup_builtin("next_wall").unwrap();
        assert!(nw.intrinsic.is_none());
        assert!(BUILTINS
            .iter()
            .filter(|b| b.name != "next_wall")
            .all(|b| b.intrinsic.is_some()));
    }

    #[test]
    fn restricted_navigation_set() {
        let restricted: Vec<_> = BUILTINS
            .iter()
            .filter(|b| b.is_restricted_navigation())
            .map(|b| b.name)
            .collect();
        assert_eq!(restricted, vec!["move_forward", "turn_left", "turn_right"]);
    }

    #[test]
    fn signatures_name_their_parameters() {
        assert_eq!(lookup_builtin("teleport").unwrap().signature(), "void teleport(int x, int y)");
        assert_eq!(lookup_builtin("print").unwrap().signature(), "void print(any value)");
        assert_eq!(lookup_builtin("is_wall").unwrap().signature(), "bool is_wall()");
    }
}
