use super::*;
use crate::{ir::Quadruple, parse};
use pretty_assertions::assert_eq;

fn analyze(text: &str) -> Analysis {
    parse::from_reader(text.as_bytes(), "test.snl")
        .unwrap()
        .analyze()
}

fn quads(analysis: &Analysis) -> Vec<String> {
    analysis.quads.iter().map(Quadruple::to_string).collect()
}

fn messages(analysis: &Analysis) -> Vec<String> {
    analysis
        .errors
        .iter()
        .map(|error| error.as_ref().to_string())
        .collect()
}

/// Verifica que los marcadores estructurales aniden correctamente.
fn balanced(quads: &[Quadruple]) -> bool {
    let mut open = Vec::new();
    for quad in quads {
        let expected = match quad.operator {
            Operator::Then | Operator::While | Operator::Procedure => {
                open.push(quad.operator);
                continue;
            }

            Operator::Else => Operator::Then,
            Operator::Do => Operator::While,
            Operator::EndIf => Operator::Else,
            Operator::EndWhile => Operator::Do,
            Operator::EndProcedure => Operator::Procedure,
            _ => continue,
        };

        if open.pop() != Some(expected) {
            return false;
        }

        match quad.operator {
            Operator::Else | Operator::Do => open.push(quad.operator),
            _ => (),
        }
    }

    open.is_empty()
}

#[test]
fn indexed_store() {
    let analysis = analyze(
        "program p
         var array [0..9] of integer a; integer i;
         begin a[i] := 5 end.",
    );

    assert!(analysis.is_ok());
    assert_eq!(
        quads(&analysis),
        vec![
            "(DECLARE, 0, 10, a)",
            "(DECLARE, 10, 1, i)",
            "(:=, 1, _, t1)",
            "(*, i, t1, t2)",
            "([], a, t2, t3)",
            "(:=:, 5, _, t3)",
        ]
    );
}

#[test]
fn nonzero_lower_bound() {
    let analysis = analyze("program p var array [1..3] of char s; begin write(s[2]) end.");

    assert!(analysis.is_ok());
    assert_eq!(
        quads(&analysis),
        vec![
            "(DECLARE, 0, 3, s)",
            "(-, 2, 1, t1)",
            "(:=, 1, _, t2)",
            "(*, t1, t2, t3)",
            "([], s, t3, t4)",
            "(load, t4, _, t5)",
            "(OUT, t5, _, _)",
        ]
    );
}

#[test]
fn record_fields() {
    let analysis = analyze(
        "program p
         var record integer a; array [0..1] of integer b; end r;
         begin r.b[1] := r.a end.",
    );

    assert!(analysis.is_ok());
    assert_eq!(
        quads(&analysis),
        vec![
            "(DECLARE, 0, 3, r)",
            "([], r, 1, t1)",
            "(:=, 1, _, t2)",
            "(*, 1, t2, t3)",
            "([], t1, t3, t4)",
            "([], r, 0, t5)",
            "(load, t5, _, t6)",
            "(:=:, t6, _, t4)",
        ]
    );
}

#[test]
fn procedure_layout() {
    let analysis = analyze(
        "program p
         var integer g;
         procedure f(integer a; var integer b);
         var integer local;
         begin local := a + 1; b := local end
         begin f(g, g) end.",
    );

    assert!(analysis.is_ok(), "{:?}", analysis.messages());
    assert_eq!(
        quads(&analysis),
        vec![
            "(DECLARE, 0, 1, g)",
            "(Go, L1, _, _)",
            "(PROCEDURE, f, _, 2)",
            "(get, 0, 1, a)",
            "(get&, 1, 1, b)",
            "(DECLARE, 2, 1, local)",
            "(+, a, 1, t1)",
            "(:=, t1, _, local)",
            "(:=, local, _, b)",
            "(ENDPROCEDURE, _, _, _)",
            "(label, L1, _, _)",
            "(param, g, _, _)",
            "(param&, g, _, _)",
            "(call, f, _, _)",
        ]
    );

    // Las locales dejan de ser visibles al salir del procedimiento
    let scopes = &analysis.scopes;
    assert!(scopes.lookup("g").is_some());
    assert!(scopes.lookup("local").is_none());

    let f = scopes.scope(scopes.global()).children()[0];
    assert_eq!(scopes.scope(f).name(), "f");
    assert!(scopes.lookup_from(f, "local").is_some());
    assert_eq!(scopes.scope(f).size(), 3);
}

#[test]
fn shadowed_procedures_get_distinct_symbols() {
    let analysis = analyze(
        "program p
         procedure f();
            procedure f();
            begin write(1) end
         begin f() end
         begin f() end.",
    );

    assert!(analysis.is_ok());
    assert_eq!(
        quads(&analysis),
        vec![
            "(Go, L1, _, _)",
            "(PROCEDURE, f, _, 0)",
            "(Go, L2, _, _)",
            "(PROCEDURE, f.1, _, 0)",
            "(OUT, 1, _, _)",
            "(ENDPROCEDURE, _, _, _)",
            "(label, L2, _, _)",
            "(call, f.1, _, _)",
            "(ENDPROCEDURE, _, _, _)",
            "(label, L1, _, _)",
            "(call, f, _, _)",
        ]
    );
}

#[test]
fn markers_are_balanced() {
    let analysis = analyze(
        "program p
         var integer i, j;
         procedure count(var integer n);
         begin
            while n < 10 do
               if n = 5 then write(n) else n := n + 1 fi;
               n := n + 1
            endwh
         end
         begin
            read(i);
            while i < 3 do
               j := 0;
               while j < i do count(j) endwh;
               i := i + 1
            endwh
         end.",
    );

    assert!(analysis.is_ok(), "{:?}", analysis.messages());
    assert!(balanced(&analysis.quads));

    let count = |operator| {
        analysis
            .quads
            .iter()
            .filter(|quad| quad.operator == operator)
            .count()
    };

    assert_eq!(count(Operator::While), count(Operator::EndWhile));
    assert_eq!(count(Operator::Then), count(Operator::EndIf));
    assert_eq!(count(Operator::Procedure), count(Operator::EndProcedure));
}

#[test]
fn errors_are_collected() {
    let analysis = analyze(
        "program p
         type t = integer; t = char;
         var integer x; char c; integer x;
         procedure f(integer a);
         begin a := 1 end
         begin
            x := c;
            y := 1;
            f(1, 2);
            x := x + c;
            c[1] := 1;
            f(z)
         end.",
    );

    assert_eq!(
        messages(&analysis),
        vec![
            "Type `t` is already defined in this scope",
            "Symbol `x` is already defined in this scope",
            "Type mismatch: expected `integer`, found `char`",
            "Symbol `y` is undefined",
            "Procedure `f` expects 1 arguments, found 2",
            "Type mismatch: expected `integer`, found `char`",
            "Cannot index into a value of type `char`",
            "Symbol `z` is undefined",
        ]
    );

    // El recorrido continúa a pesar de los errores
    assert!(balanced(&analysis.quads));
    assert_eq!(
        analysis.quads.last().map(Quadruple::to_string).as_deref(),
        Some("(call, f, _, _)")
    );
}

#[test]
fn aggregate_rules() {
    let analysis = analyze(
        "program p
         type arr = array [1..3] of integer;
         var arr a, b; record integer f; end r; array [5..1] of integer bad;
         procedure g(arr v);
         begin v[1] := 1 end
         procedure h(var integer q);
         begin q := 1 end
         begin a := b; r.h := 1; g(a); write(a); h(1) end.",
    );

    assert_eq!(
        messages(&analysis),
        vec![
            "Invalid array bounds: upper bound 1 is less than lower bound 5",
            "Parameter `v` has aggregate type and must be passed by reference",
            "Cannot assign values of aggregate type `array [1..3] of integer`",
            "No field named `h`",
            "Expected `integer` or `char`, found `array [1..3] of integer`",
            "Arguments for reference parameters must be variables",
        ]
    );
}

#[test]
fn messages_carry_locations() {
    let analysis = analyze("program p\nbegin\n  write(nope)\nend.");
    assert_eq!(
        analysis.messages(),
        vec!["test.snl:[3:9-3:12]: Symbol `nope` is undefined"]
    );
}

#[test]
fn storage_limits() {
    let analysis = analyze(
        "program p
         var array [0..2147483647] of integer huge;
             array [1..1000000000] of integer a, b, c;
             record array [1..1500000000] of char x, y; end r;
             integer ok;
         begin ok := 1 end.",
    );

    assert_eq!(
        messages(&analysis),
        vec![
            "Storage of 2147483648 units exceeds the limit of 2147483647 units",
            "Storage of 3000000000 units exceeds the limit of 2147483647 units",
            "Storage of 3000000000 units exceeds the limit of 2147483647 units",
        ]
    );

    // Las declaraciones que sí caben conservan desplazamientos contiguos
    let declares: Vec<_> = quads(&analysis)
        .into_iter()
        .filter(|quad| quad.starts_with("(DECLARE"))
        .collect();

    assert_eq!(
        declares,
        vec![
            "(DECLARE, 0, 1000000000, a)",
            "(DECLARE, 1000000000, 1000000000, b)",
            "(DECLARE, 2000000000, 1, ok)",
        ]
    );
}
