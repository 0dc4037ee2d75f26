//! Pruebas de punta a punta: código fuente, cuádruplos, ensamblador y
//! ejecución en el simulador de `runtime`.
//!
//! Cada programa se compila con y sin plegado de constantes; ambas
//! versiones deben producir la misma salida.

use pretty_assertions::assert_eq;
use runtime::ExecError;
use snlc::{
    codegen::{self, Options},
    fold, parse,
};

fn assemble(source: &str, optimize: bool) -> String {
    let analysis = parse::from_reader(source.as_bytes(), "pipeline.snl")
        .unwrap()
        .analyze();

    assert!(analysis.is_ok(), "{:?}", analysis.messages());

    let quads = if optimize {
        fold::fold(&analysis.quads).quads
    } else {
        analysis.quads
    };

    let listing = codegen::generate(&quads, Options::ANNOTATE).unwrap();
    assert!(listing.warnings().is_empty(), "{:?}", listing.warnings());

    listing.to_string()
}

fn execute(source: &str, input: &[i32], optimize: bool) -> Result<String, runtime::Error> {
    let exit = runtime::run(&assemble(source, optimize), input.iter().copied())?;
    Ok(exit.output)
}

fn run(source: &str, input: &[i32]) -> String {
    let plain = execute(source, input, false).unwrap();
    let folded = execute(source, input, true).unwrap();

    assert_eq!(plain, folded);
    plain
}

#[test]
fn conditional() {
    let source = "program q
                  var integer a, b, x;
                  begin
                     read(a); read(b);
                     if a < b then x := 1 else x := 2 fi;
                     write(x)
                  end.";

    assert_eq!(run(source, &[1, 2]), "1\n");
    assert_eq!(run(source, &[2, 1]), "2\n");
    assert_eq!(run(source, &[2, 2]), "2\n");
}

#[test]
fn equality() {
    let source = "program q
                  var integer a;
                  begin
                     read(a);
                     if a = 7 then write(1) else write(0) fi
                  end.";

    assert_eq!(run(source, &[7]), "1\n");
    assert_eq!(run(source, &[8]), "0\n");
}

#[test]
fn summation_loop() {
    let source = "program q
                  var integer i, n, s;
                  begin
                     read(n);
                     i := 1; s := 0;
                     while i < n + 1 do s := s + i; i := i + 1 endwh;
                     write(s)
                  end.";

    assert_eq!(run(source, &[10]), "55\n");
    assert_eq!(run(source, &[0]), "0\n");
}

#[test]
fn nested_loops() {
    let source = "program q
                  var integer i, j, count;
                  begin
                     i := 0; count := 0;
                     while i < 4 do
                        j := 0;
                        while j < i do count := count + 1; j := j + 1 endwh;
                        i := i + 1
                     endwh;
                     write(count)
                  end.";

    assert_eq!(run(source, &[]), "6\n");
}

#[test]
fn arrays() {
    let source = "program q
                  var array [1..5] of integer a; integer i, s;
                  begin
                     i := 1;
                     while i < 6 do a[i] := i * i; i := i + 1 endwh;
                     s := 0; i := 5;
                     while 0 < i do s := s + a[i]; write(a[i]); i := i - 1 endwh;
                     write(s)
                  end.";

    assert_eq!(run(source, &[]), "25\n16\n9\n4\n1\n55\n");
}

#[test]
fn records() {
    let source = "program q
                  type point = record integer x, y; array [0..2] of integer h; end;
                  var point p, r; integer i;
                  begin
                     p.x := 3; p.y := 4;
                     i := 0;
                     while i < 3 do p.h[i] := p.x * i + p.y; i := i + 1 endwh;
                     r.x := p.h[2]; r.y := p.h[1];
                     write(r.x + r.y);
                     write(p.h[0])
                  end.";

    assert_eq!(run(source, &[]), "17\n4\n");
}

#[test]
fn reference_parameters() {
    let source = "program q
                  var integer a, b;
                  procedure swap(var integer x; var integer y);
                  var integer t;
                  begin t := x; x := y; y := t end
                  begin
                     read(a); read(b);
                     swap(a, b);
                     write(a); write(b)
                  end.";

    assert_eq!(run(source, &[3, 7]), "7\n3\n");
}

#[test]
fn value_parameters() {
    let source = "program q
                  var integer total;
                  procedure add(integer n; var integer acc);
                  begin
                     while 0 < n do acc := acc + n; n := n - 1 endwh
                  end
                  begin
                     total := 100;
                     add(4, total);
                     write(total)
                  end.";

    assert_eq!(run(source, &[]), "110\n");
}

#[test]
fn enclosing_variables() {
    let source = "program q
                  var integer count, i;
                  procedure bump();
                  begin count := count + 1 end
                  begin
                     count := 0; i := 0;
                     while i < 5 do bump(); i := i + 1 endwh;
                     write(count)
                  end.";

    assert_eq!(run(source, &[]), "5\n");
}

#[test]
fn aggregates_and_elements_by_reference() {
    let source = "program q
                  type arr = array [1..4] of integer;
                  var arr a; integer i, s;
                  procedure fill(var arr b; integer k);
                  var integer j;
                  begin
                     j := 1;
                     while j < 5 do b[j] := j * k; j := j + 1 endwh
                  end
                  procedure inc(var integer x);
                  begin x := x + 1 end
                  begin
                     fill(a, 3);
                     i := 1;
                     while i < 5 do inc(a[i]); i := i + 1 endwh;
                     s := 0; i := 1;
                     while i < 5 do s := s + a[i]; write(a[i]); i := i + 1 endwh;
                     write(s)
                  end.";

    assert_eq!(run(source, &[]), "4\n7\n10\n13\n34\n");
}

#[test]
fn forwarded_references() {
    let source = "program q
                  var integer n;
                  procedure inc(var integer x);
                  begin x := x + 1 end
                  procedure twice(var integer y);
                  begin inc(y); inc(y) end
                  begin
                     read(n);
                     twice(n);
                     write(n)
                  end.";

    assert_eq!(run(source, &[5]), "7\n");
}

#[test]
fn declarer_locals() {
    let source = "program q
                  var integer r;
                  procedure outer(integer n);
                  var integer total;
                  procedure add(integer k);
                  begin total := total + k end
                  begin
                     total := 0;
                     while 0 < n do add(n); n := n - 1 endwh;
                     r := total
                  end
                  begin
                     outer(4);
                     write(r)
                  end.";

    assert_eq!(run(source, &[]), "10\n");
}

#[test]
fn folded_constants() {
    let source = "program q var integer x; begin x := 2 + 3 * 4; write(x) end.";

    assert_eq!(run(source, &[]), "14\n");
    assert!(assemble(source, true).contains("\tli      $t0, 14\n"));
    assert!(!assemble(source, true).contains("mul"));
}

#[test]
fn division_by_zero_reaches_run_time() {
    let source = "program q var integer x, y; begin read(y); x := y / 0; write(x) end.";

    for optimize in [false, true] {
        let result = execute(source, &[5], optimize);
        assert!(
            matches!(
                result,
                Err(runtime::Error::Exec(ExecError::DivisionByZero(_)))
            ),
            "{:?}",
            result
        );
    }
}

#[test]
fn exhausted_input() {
    let source = "program q var integer x; begin read(x); read(x) end.";
    let result = execute(source, &[1], false);

    assert!(matches!(result, Err(runtime::Error::Exec(ExecError::InputExhausted))));
}
