//! Emission tests
//!
//! End-to-end checks over the generated assembly text: calling-convention
//! lowering, flag fusion, division, bounds checks, frame shape.

use crate::pipeline::compile;

fn asm_of(source: &str) -> String {
    compile(source)
        .unwrap_or_else(|e| panic!("compilation failed: {:?}", e))
        .asm
}

/// Position of `needle` in `hay`, for ordering assertions
fn pos(hay: &str, needle: &str) -> usize {
    hay.find(needle)
        .unwrap_or_else(|| panic!("`{}` not found in:\n{}", needle, hay))
}

#[test]
fn test_two_parameter_add() {
    let asm = asm_of(
        r#"
        define @add2(a, b) {
        body:
            %s = add %a, %b
            return %s
        }
        define @main() {
        body:
            %r = call @add2(1, 2)
            return %r
        }
        "#,
    );

    // parameters are parked from their incoming registers...
    assert!(asm.contains("\tmovq\t%rdi, %r"));
    assert!(asm.contains("\tmovq\t%rsi, %r"));
    // ...the sum is computed through the scratch register...
    let add = pos(&asm, "\taddq\t");
    assert!(asm[..add].contains(", %r10"));
    let store = pos(&asm, "\tmovq\t%r10, %r");
    assert!(add < store);
    // ...and lands in the result register before the return
    assert!(asm.contains(", %rax"));

    // two parameters fit in registers: no frame traffic in the body
    let body_start = pos(&asm, "add2:");
    let body_end = pos(&asm, "_main:");
    assert!(
        !asm[body_start..body_end].contains("(%rbp)"),
        "no spill expected in add2:\n{}",
        &asm[body_start..body_end]
    );
}

#[test]
fn test_eight_argument_call() {
    let asm = asm_of(
        r#"
        define @f(a, b, c, d, e, g, h, i) {
        body:
            return %a
        }
        define @main() {
        body:
            %r = call @f(1, 2, 3, 4, 5, 6, 7, 8)
            return %r
        }
        "#,
    );

    // the two overflow arguments get one 16-byte-aligned reservation
    assert!(asm.contains("\tsubq\t$16, %rsp"));
    assert!(asm.contains("\tmovq\t$7, (%rsp)"));
    assert!(asm.contains("\tmovq\t$8, 8(%rsp)"));
    // six register arguments in parameter order
    for (value, reg) in [
        ("$1", "%rdi"),
        ("$2", "%rsi"),
        ("$3", "%rdx"),
        ("$4", "%rcx"),
        ("$5", "%r8"),
        ("$6", "%r9"),
    ] {
        assert!(asm.contains(&format!("\tmovq\t{}, {}", value, reg)));
    }
    // placed highest index first
    assert!(pos(&asm, "\tmovq\t$6, %r9") < pos(&asm, "\tmovq\t$1, %rdi"));
    // the reservation is released right after the call returns
    let call = pos(&asm, "\tcallq\tf");
    let release = pos(&asm, "\taddq\t$16, %rsp");
    assert!(call < release);

    // the callee reads its stack-passed parameters from above the frame
    assert!(asm.contains("\tmovq\t16(%rbp), %r10"));
    assert!(asm.contains("\tmovq\t24(%rbp), %r10"));
}

#[test]
fn test_comparison_branch_fusion() {
    let asm = asm_of(
        r#"
        define @main() {
        head:
            %c = lt %a, %b
            if_false %c goto done
        body:
            %x = 1
            goto done
        done:
            return
        }
        "#,
    );

    // the branch reuses the comparison's flags, inverted
    assert!(asm.contains("\tjge\t.main_done"));
    // no explicit zero test anywhere
    assert!(!asm.contains("\tcmpq\t$0,"));
    // the comparison still materializes its boolean result
    assert!(asm.contains("\tsetl\t%al"));
    assert!(asm.contains("\tmovzbq\t%al, %r10"));
}

#[test]
fn test_branch_without_adjacent_comparison() {
    let asm = asm_of(
        r#"
        define @main() {
        head:
            %c = lt %a, %b
            %d = %c
            if_false %d goto done
        body:
            %x = 1
            goto done
        done:
            return
        }
        "#,
    );

    // the intervening copy cleared the pending comparison
    assert!(asm.contains("\tcmpq\t$0,"));
    assert!(asm.contains("\tje\t.main_done"));
    assert!(!asm.contains("\tjge\t"));
}

#[test]
fn test_division_preserves_rdx() {
    let asm = asm_of(
        r#"
        define @main() {
        body:
            %q = div %a, %b
            %m = mod %q, 3
            return %m
        }
        "#,
    );

    // %rdx is parked in its save slot around the division
    let save = pos(&asm, "\tmovq\t%rdx, -");
    let divide = pos(&asm, "\tidivq\t");
    assert!(save < divide);
    assert!(asm.contains("\tcqto"));
    // the restore reads the same slot back
    let save_line = asm[save..].lines().next().unwrap();
    let slot = save_line.rsplit(' ').next().unwrap();
    let restore = format!("\tmovq\t{}, %rdx", slot);
    assert!(asm.contains(&restore), "missing `{}` in:\n{}", restore, asm);

    // an immediate divisor is routed through the scratch register
    assert!(asm.contains("\tmovq\t$3, %r10"));
    assert!(asm.contains("\tidivq\t%r10"));
    // the remainder comes out of %rdx
    assert!(asm.contains("\tmovq\t%rdx, %r"));
}

#[test]
fn test_bounds_check_emission() {
    let asm = asm_of(
        r#"
        array tbl[10]
        define @main() {
        body:
            %i = 11
            checkbounds %i, 10
            %a = getaddr @tbl, %i, 10
            %x = %a
            return %x
        }
        "#,
    );

    // lower guard: index >= 0 or fault
    let lower = pos(&asm, "\tjge\t.index_non_negative_check_done_0");
    assert!(asm.contains(".index_non_negative_check_done_0:"));
    // upper guard: index < length or fault
    let upper = pos(&asm, "\tjl\t.index_less_than_array_length_check_done_0");
    assert!(asm.contains(".index_less_than_array_length_check_done_0:"));
    assert!(lower < upper);
    // both fault exits
    assert!(asm.matches("\tcallq\t_exit").count() >= 2);
    assert!(asm.contains("\tmovq\t$-1, %rdi"));
    assert!(asm.contains("\tcmpq\t$10,"));
}

#[test]
fn test_stack_array_addressing() {
    let asm = asm_of(
        r#"
        define @main() {
        body:
            stack buf[4]
            %i = 1
            %a = getaddr %buf, %i, 4
            %a = 9
            %x = %a
            return %x
        }
        "#,
    );

    // the store goes through a frame-based indexed operand
    assert!(asm.contains("(%rbp,%r"), "expected indexed frame operand:\n{}", asm);
    assert!(asm.contains(",8)"));
    // the array block lives below the frame pointer, 16-byte aligned
    assert!(asm.contains("-32(%rbp,"));
}

#[test]
fn test_caller_saved_value_survives_call() {
    let asm = asm_of(
        r#"
        define @f() {
        body:
            return 1
        }
        define @main() {
        body:
            %a = 5
            %r = call @f()
            %s = add %a, %r
            return %s
        }
        "#,
    );

    // %a lives in a caller-saved register across the call: it is stored
    // to a save slot before the call and reloaded after
    let call = pos(&asm, "\tcallq\tf");
    let main_start = pos(&asm, "_main:");
    let before = &asm[main_start..call];
    let after = &asm[call..];
    let save = before
        .lines()
        .find(|l| l.starts_with("\tmovq\t%r") && l.ends_with("(%rbp)"))
        .expect("caller save expected before the call");
    let reg = save.trim_start().split(|c| c == '\t' || c == ',').nth(1).unwrap();
    let slot = save.rsplit(' ').next().unwrap();
    let restore = format!("\tmovq\t{}, {}", slot, reg);
    assert!(
        after.contains(&restore),
        "missing restore `{}` after call in:\n{}",
        restore,
        asm
    );
}

#[test]
fn test_method_frame_shape() {
    let asm = asm_of(
        r#"
        define @main() {
        body:
            %x = 1
            return %x
        }
        "#,
    );

    let prologue = [
        "\tpushq\t%rbp",
        "\tmovq\t%rsp, %rbp",
        "\tsubq\t$",
    ];
    let mut last = pos(&asm, "_main:");
    for piece in prologue {
        let at = pos(&asm[last..], piece) + last;
        assert!(at >= last);
        last = at;
    }

    // frame size is a multiple of 16
    let subq = pos(&asm, "\tsubq\t$");
    let amount: i64 = asm[subq + 7..]
        .split(',')
        .next()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(amount % 16, 0);
    assert!(amount >= 16);

    // the entry method zeroes its exit code right before returning
    let zero = pos(&asm, "\txorl\t%eax, %eax");
    let ret = pos(&asm, "\tretq");
    assert!(zero < ret);
}

#[test]
fn test_copy_between_identical_locations_elided() {
    let asm = asm_of(
        r#"
        define @main() {
        body:
            %x = 7
            %x = %x
            return %x
        }
        "#,
    );

    // the self-copy vanishes: %x's register is written exactly once
    // before the return move
    let loads = asm
        .lines()
        .filter(|l| l.starts_with("\tmovq\t$7"))
        .count();
    assert_eq!(loads, 1);
    let moves_between_same = asm.lines().any(|l| {
        if let Some(rest) = l.strip_prefix("\tmovq\t") {
            let mut parts = rest.split(", ");
            let a = parts.next();
            let b = parts.next();
            a.is_some() && a == b
        } else {
            false
        }
    });
    assert!(!moves_between_same, "self-moves should be elided:\n{}", asm);
}

#[test]
fn test_global_scalar_round_trip() {
    let asm = asm_of(
        r#"
        global counter, 8
        define @main() {
        body:
            %c = @counter
            %c2 = add %c, 1
            @counter = %c2
            return
        }
        "#,
    );

    assert!(asm.contains("\t.comm counter,8,8"));
    // the load reads rip-relative
    assert!(asm.contains("\tmovq\tcounter(%rip), %r"));
    // the store writes rip-relative
    assert!(asm.contains(", counter(%rip)"));
}
