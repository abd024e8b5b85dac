//! Tests for the Opcode enum

use bytecode_system::{CompareKind, Opcode, RegisterId, ScopeLayout};

#[test]
fn test_compare_opcode_carries_swap_flag() {
    let op = Opcode::Compare {
        kind: CompareKind::LessThan,
        swap: true,
    };
    match op {
        Opcode::Compare { kind, swap } => {
            assert_eq!(kind, CompareKind::LessThan);
            assert!(swap);
        }
        _ => panic!("Expected Compare"),
    }
}

#[test]
fn test_push_scope_layout_groups() {
    let op = Opcode::PushScope(ScopeLayout {
        vars: vec!["v".into()],
        lets: vec!["l".into()],
        consts: vec!["c".into()],
        variable_scope: true,
    });
    if let Opcode::PushScope(layout) = op {
        assert_eq!(layout.vars, vec!["v"]);
        assert_eq!(layout.lets, vec!["l"]);
        assert_eq!(layout.consts, vec!["c"]);
        assert!(layout.variable_scope);
    } else {
        panic!("Expected PushScope");
    }
}

#[test]
fn test_local_opcodes() {
    let reg = RegisterId(5);
    assert_eq!(Opcode::LoadLocal(reg), Opcode::LoadLocal(RegisterId(5)));
    assert_ne!(Opcode::LoadLocal(reg), Opcode::StoreLocal(reg));
}

#[test]
fn test_numeric_binary_classification() {
    assert!(Opcode::ShiftLeft.is_numeric_binary());
    assert!(Opcode::Mod.is_numeric_binary());
    assert!(!Opcode::Add.is_numeric_binary());
    assert!(!Opcode::Equal.is_numeric_binary());
}
