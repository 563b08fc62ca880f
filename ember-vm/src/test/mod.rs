use std::{cell::RefCell, io::Write, rc::Rc};

use crate::{err::RuntimeError, ext, val::Value, vm::Vm};

type Sink = Rc<RefCell<Vec<u8>>>;

fn engine() -> (Vm, Sink) {
    let _ = env_logger::builder().is_test(true).try_init();
    let buf: Sink = Rc::new(RefCell::new(Vec::new()));
    let out: Rc<RefCell<dyn Write>> = buf.clone();
    let mut vm = Vm::new();
    vm.set_output(out);
    (vm, buf)
}

fn eval(src: &str) -> anyhow::Result<Value> {
    engine().0.eval_str(src)
}

fn show(src: &str) -> anyhow::Result<String> {
    Ok(eval(src)?.to_string())
}

fn error_of(src: &str) -> RuntimeError {
    match eval(src) {
        Ok(v) => panic!("{src} evaluated to {v}"),
        Err(e) => match e.downcast_ref::<RuntimeError>() {
            Some(kind) => kind.clone(),
            None => panic!("{src} failed with a non-runtime error: {e}"),
        },
    }
}

fn run_script(path: &str) -> anyhow::Result<String> {
    let (mut vm, _) = engine();
    vm.load_file(path)?;
    Ok(vm.run()?.to_string())
}

#[test]
fn scripts() -> anyhow::Result<()> {
    assert_eq!(run_script("src/test/scripts/fib.em")?, "610");
    assert_eq!(run_script("src/test/scripts/counters.em")?, "[3 2]");
    assert_eq!(run_script("src/test/scripts/data.em")?, r#"[19 [1] [2.5] "hi"]"#);
    assert_eq!(run_script("src/test/scripts/words.em")?, "[3 2 1 3]");
    Ok(())
}

#[test]
fn special_forms() -> anyhow::Result<()> {
    assert_eq!(show("(if false 1)")?, "()");
    assert_eq!(show("(if 0 'yes 'no)")?, "no");
    assert_eq!(show("(and 1 2 3)")?, "3");
    assert_eq!(show("(and 1 false 3)")?, "false");
    assert_eq!(show("(or false () 7)")?, "7");
    assert_eq!(show("(or)")?, "false");
    assert_eq!(show("(and)")?, "true");
    assert_eq!(show("(let ((a 1) (b 2)) (+ a b))")?, "3");
    assert_eq!(show("(def x 1) (set! x (+ x 1)) x")?, "2");
    assert_eq!(show("(begin 1 2 'three)")?, "three");
    assert_eq!(show("'(1 . 2)")?, "(1 . 2)");
    assert_eq!(show("[1 (+ 1 1) 'x]")?, "[1 2 x]");
    Ok(())
}

#[test]
fn lists_and_predicates() -> anyhow::Result<()> {
    assert_eq!(show("(cons 1 (cons 2 ()))")?, "(1 2)");
    assert_eq!(show("(first '(1 2))")?, "1");
    assert_eq!(show("(cdr '(1 2))")?, "(2)");
    assert_eq!(show("(rest [1 2 3])")?, "[2 3]");
    assert_eq!(show("(apply list (list 1 2 3))")?, "(1 2 3)");
    assert_eq!(show("(apply + [1 2 3])")?, "6");
    assert_eq!(show("[(list? '(1)) (list? '(1 . 2)) (pair? '(1 . 2)) (null? ())]")?, "[true false true true]");
    assert_eq!(show("[(empty? \"\") (empty? []) (empty? (make-data)) (empty? 0)]")?, "[true true true false]");
    assert_eq!(show("[(zero? 0.0) (number? #a) (string? \"s\") (symbol? 'a)]")?, "[true true true true]");
    assert_eq!(show("(= (symnum 'foo) (symnum 'foo))")?, "true");
    assert_eq!(show("(not ())")?, "true");
    assert_eq!(error_of("(first [])"), RuntimeError::IndexOutOfBounds { index: 0, len: 0 });
    Ok(())
}

#[test]
fn division() -> anyhow::Result<()> {
    assert_eq!(error_of("(/ 7 0)"), RuntimeError::DivideByZero);
    assert_eq!(eval("(/ 7.0 0.0)")?, Value::Float(f64::INFINITY));
    assert_eq!(eval("(mod 7 3)")?, Value::Int(1));
    assert_eq!(error_of("(mod 7 0)"), RuntimeError::DivideByZero);
    Ok(())
}

#[test]
fn comparisons_promote() -> anyhow::Result<()> {
    assert_eq!(show("[(< 1 1.5) (= 2 2.0) (> #b #a) (<= \"abc\" \"abd\")]")?, "[true true true true]");
    assert!(matches!(error_of("(< 1 \"a\")"), RuntimeError::TypeMismatch { .. }));
    assert!(matches!(error_of("(< 1)"), RuntimeError::WrongArity { .. }));
    Ok(())
}

#[test]
fn containers_are_shared() -> anyhow::Result<()> {
    let src = "
        (def a [1 2])
        (defn poke [x] (aset! x 0 99))
        (poke a)
        (def h {'k 1})
        (hset! h 'k 2)
        (hset! h \"s\" 3)
        [a (hget h 'k) (len h)]";
    assert_eq!(show(src)?, "[[99 2] 2 2]");
    Ok(())
}

#[test]
fn hash_access() -> anyhow::Result<()> {
    assert_eq!(show("(hget {1 2} 3 'none)")?, "none");
    assert_eq!(error_of("(hget {1 2} 3)"), RuntimeError::KeyNotFound("3".into()));
    assert_eq!(show("(def h {1 2 3 4}) (hdel! h 1) (hdel! h 42) [(len h) (hget h 3)]")?, "[1 4]");
    assert!(matches!(error_of("(hash 1 2 3)"), RuntimeError::WrongArity { .. }));
    assert_eq!(show("(map (fn [v] (* v 10)) {'a 1})")?, "{a 10}");
    Ok(())
}

#[test]
fn indexing() -> anyhow::Result<()> {
    assert_eq!(show("(slice [1 2 3] 1 3)")?, "[2 3]");
    assert_eq!(error_of("(slice [1 2 3] 1 5)"), RuntimeError::IndexOutOfBounds { index: 5, len: 3 });
    assert_eq!(show("(slice \"hello\" 1 3)")?, "\"el\"");
    assert_eq!(show("(sget \"abc\" 1)")?, "#b");
    assert_eq!(show("(aget (make-array 3 'x) 2)")?, "x");
    assert!(matches!(error_of("(aget [1] 1)"), RuntimeError::IndexOutOfBounds { .. }));
    assert_eq!(show("[(len \"héllo\") (len '(1 2)) (len (make-data 1))]")?, "[6 2 8]");
    Ok(())
}

#[test]
fn oversized_arrays_fail_cleanly() {
    for n in ["10000000000000", "9223372036854775807"] {
        assert!(matches!(
            error_of(&format!("(make-array {n})")),
            RuntimeError::AllocationFailed { .. }
        ));
    }
}

#[test]
fn long_lists_from_scripts() -> anyhow::Result<()> {
    let src = "(def xs (foldl (make-data (make-array 300000 #a)) cons ())) (len xs)";
    assert_eq!(eval(src)?, Value::Int(300000));
    Ok(())
}

#[test]
fn coalescing_variants() -> anyhow::Result<()> {
    assert_eq!(show("(?concat [] () [1] \"\" [2])")?, "[1 2]");
    assert_eq!(show("(?append [] () [1] \"\" [2])")?, "[[1] [2]]");
    assert_eq!(show("(append [] () [1] \"\" [2])")?, "[() [1] \"\" [2]]");
    assert!(matches!(
        error_of("(concat [] () [1] \"\" [2])"),
        RuntimeError::TypeMismatch { .. }
    ));
    assert_eq!(show("(append \"a\" 1 #b)")?, "\"a1b\"");
    assert_eq!(show("(concat '(1) '(2 3))")?, "(1 2 3)");
    assert!(matches!(error_of("(append [1])"), RuntimeError::WrongArity { .. }));
    Ok(())
}

#[test]
fn map_reenters_with_the_same_bindings() -> anyhow::Result<()> {
    let src = "
        (def scale 10)
        (defn f [x] (* x scale))
        [(f 2) (map f [1 2 3]) (map f '(4))]";
    assert_eq!(show(src)?, "[20 [10 20 30] (40)]");

    let nested = "(map (fn [x] (map (fn [y] (+ x y)) [1 2])) [10 20])";
    assert_eq!(show(nested)?, "[[11 12] [21 22]]");

    assert_eq!(error_of("(map (fn [x] x) '(1 . 2))"), RuntimeError::NotAList);
    Ok(())
}

#[test]
fn foldl_threads_accumulator_second() -> anyhow::Result<()> {
    assert_eq!(show("(foldl [1 2 3] cons ())")?, "(3 2 1)");
    assert_eq!(show("(foldl '(1 2 . 3) + 0)")?, "6");
    assert_eq!(show("(foldl {'a 1} (fn [kv acc] (cons kv acc)) ())")?, "((a . 1))");
    Ok(())
}

#[test]
fn foldl_over_data_chunks() -> anyhow::Result<()> {
    let count = "(foldl (make-data \"abcdefg\") (fn [c n] (+ n 1)) 0 3)";
    assert_eq!(eval(count)?, Value::Int(3));
    let rebuild = "(cvert-str (foldl (make-data \"abcdefg\") (fn [c acc] (append acc c)) (make-data) 3))";
    assert_eq!(show(rebuild)?, "\"abcdefg\"");
    // non-positive chunk sizes fall back to one byte
    assert_eq!(eval("(foldl (make-data \"abc\") (fn [c n] (+ n 1)) 0 0)")?, Value::Int(3));
    Ok(())
}

#[test]
fn foldl_errors_surface_unchanged() -> anyhow::Result<()> {
    let src = "(foldl [1 2 3] (fn [x acc] (if (= x 2) (/ 1 0) (+ x acc))) 0)";
    assert_eq!(error_of(src), RuntimeError::DivideByZero);

    let (mut vm, _) = engine();
    vm.eval_str("(defn step [x acc] (if (= x 3) (/ x 0) (+ x acc)))")?;
    let step = vm.global("step").ok_or_else(|| anyhow::anyhow!("step missing"))?;
    let seq = Value::array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    let Err(err) = crate::seq::foldl(&mut vm, &seq, &step, Value::Int(0), 1) else {
        panic!("fold should fail");
    };
    assert_eq!(err.acc, Value::Int(3));
    Ok(())
}

#[test]
fn codec_round_trips() -> anyhow::Result<()> {
    assert_eq!(show("(cvert-int64 (make-data 1000000007))")?, "[1000000007]");
    assert_eq!(show("(cvert-int32 (make-data 5))")?, "[5]");
    assert_eq!(show("(cvert-float64 (make-data -0.25) \"1.5\" 2)")?, "[-0.25 1.5 2.0]");
    assert_eq!(show("(len (?make-data () \"ab\" [] 1))")?, "10");
    assert!(matches!(error_of("(make-data {})"), RuntimeError::UnsupportedType { .. }));
    assert!(matches!(
        error_of("(cvert-int64 1 'sym)"),
        RuntimeError::ConversionUnsupported { index: 1, .. }
    ));
    assert_eq!(show("(str \"a\")")?, "\"\\\"a\\\"\"");
    Ok(())
}

#[test]
fn print_goes_to_the_output_sink() -> anyhow::Result<()> {
    let (mut vm, out) = engine();
    vm.eval_str("(println \"a\" 1 [2]) (print 'x) (print \"y\")")?;
    assert_eq!(String::from_utf8_lossy(&out.borrow()), "a 1 [2]\nxy");
    Ok(())
}

#[test]
fn read_and_eval() -> anyhow::Result<()> {
    assert_eq!(eval("(eval (read \"(+ 1 2)\"))")?, Value::Int(3));
    assert_eq!(eval("(read \"\")")?, Value::End);
    assert_eq!(eval("(eval '(def z 5)) z")?, Value::Int(5));
    assert_eq!(eval("(defn g [] (eval '(+ 1 1))) (+ (g) 1)")?, Value::Int(3));
    assert!(matches!(error_of("(eval '(def))"), RuntimeError::CompileFailure(_)));
    Ok(())
}

fn call_with_five(vm: &mut Vm, _: &str, args: &[Value]) -> anyhow::Result<Value> {
    vm.apply(&args[0], &[Value::Int(5)])
}

fn always_one(_: &mut Vm, _: &str, _: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Int(1))
}

fn always_two(_: &mut Vm, _: &str, _: &[Value]) -> anyhow::Result<Value> {
    Ok(Value::Int(2))
}

#[test]
fn host_functions() -> anyhow::Result<()> {
    let (mut vm, _) = engine();
    assert!(!vm.has_function("with-5"));
    vm.add_function("with-5", call_with_five);
    assert!(vm.has_function("with-5"));
    assert_eq!(vm.eval_str("(with-5 (fn [x] (* x x)))")?, Value::Int(25));
    assert_eq!(vm.eval_str("(with-5 (fn [x] (with-5 (fn [y] (+ x y)))))")?, Value::Int(10));

    vm.add_function("k", always_one);
    vm.add_function("k", always_two);
    assert_eq!(vm.eval_str("(k)")?, Value::Int(2));

    // globals shadow builtins of the same name
    assert_eq!(vm.eval_str("(def k 3) k")?, Value::Int(3));
    Ok(())
}

#[test]
fn duplicate_shares_globals_not_stack() -> anyhow::Result<()> {
    let (mut vm, _) = engine();
    vm.eval_str("(def shared 41)")?;
    let mut dup = vm.duplicate();
    assert_eq!(dup.eval_str("(+ shared 1)")?, Value::Int(42));
    dup.eval_str("(def from-dup 1)")?;
    assert_eq!(vm.global("from-dup"), Some(Value::Int(1)));
    Ok(())
}

mod fs {
    use super::*;

    fn fs_engine() -> Vm {
        let (mut vm, _) = engine();
        ext::fs::import(&mut vm);
        vm
    }

    #[test]
    fn append_and_read() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let f = dir.path().join("out.bin");
        let f = f.to_string_lossy();
        let mut vm = fs_engine();

        let src = format!(r#"(fs-append-file {f:?} (make-data "hello ") (make-data "world"))"#);
        assert_eq!(vm.eval_str(&src)?, Value::Int(11));
        assert_eq!(vm.eval_str(&format!("(cvert-str (fs-read-file {f:?}))"))?.to_string(), "\"hello world\"");
        assert_eq!(vm.eval_str(&format!("(cvert-str (fs-read-file {f:?} 6 3))"))?.to_string(), "\"wor\"");

        let info = vm.eval_str(&format!("(def i (fs-file-info {f:?})) [(hget i \"size\") (hget i \"exists\") (hget i \"isdir\")]"))?;
        assert_eq!(info.to_string(), "[11 true false]");

        let missing = format!("{f}.nope");
        assert_eq!(vm.eval_str(&format!("(hget (fs-file-info {missing:?}) \"exists\")"))?, Value::Bool(false));
        assert_eq!(vm.eval_str(&format!("(fs-file-exists {f:?} {missing:?})"))?, Value::Bool(false));

        vm.eval_str(&format!("(fs-remove-file {f:?})"))?;
        assert_eq!(vm.eval_str(&format!("(fs-file-exists {f:?})"))?, Value::Bool(false));
        Ok(())
    }

    #[test]
    fn streaming() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let f = dir.path().join("stream.bin");
        let f = f.to_string_lossy();
        let mut vm = fs_engine();

        let write = format!(
            r#"(def parts ["ab" "cd" "efghijk"])
               (def i 0)
               (fs-append-file-s {f:?}
                 (fn [pos]
                   (if (< i (len parts))
                     (let [s (aget parts i)]
                       (set! i (+ i 1))
                       (make-data s))
                     (make-data))))"#
        );
        assert_eq!(vm.eval_str(&write)?, Value::Int(11));

        let read = format!(
            "(def n 0) [(fs-read-file-s {f:?} (fn [pos d] (set! n (+ n 1)) false) 4) n]"
        );
        assert_eq!(vm.eval_str(&read)?.to_string(), "[11 3]");

        let abort = format!("(fs-read-file-s {f:?} (fn [pos d] true) 4)");
        assert_eq!(vm.eval_str(&abort)?, Value::Int(4));

        let offset = format!("(fs-read-file-s {f:?} (fn [pos d] false) 4 2 5)");
        assert_eq!(vm.eval_str(&offset)?, Value::Int(5));

        // a chunk far past the file size hands over the whole file at once
        let huge = format!(
            "(def got []) [(fs-read-file-s {f:?} (fn [pos d] (set! got (append got (len d))) false) 100000000000000) got]"
        );
        assert_eq!(vm.eval_str(&huge)?.to_string(), "[11 [11]]");
        Ok(())
    }

    #[test]
    fn directories() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("b.txt"), "b")?;
        std::fs::write(dir.path().join("a.txt"), "a")?;
        std::fs::create_dir(dir.path().join("sub"))?;
        std::fs::write(dir.path().join("sub").join("c.txt"), "c")?;
        let d = dir.path().to_string_lossy();
        let mut vm = fs_engine();

        let names = vm.eval_str(&format!("(map (fn [h] (hget h \"name\")) (fs-readdir {d:?}))"))?;
        assert_eq!(names.to_string(), r#"["a.txt" "b.txt" "sub"]"#);

        let walk = format!("(def n 0) [(fs-walk (fn [info] (set! n (+ n 1)) false) {d:?}) n]");
        assert_eq!(vm.eval_str(&walk)?.to_string(), "[true 5]");

        let stop = format!("(def n 0) [(fs-walk (fn [info] (set! n (+ n 1)) true) {d:?}) n]");
        assert_eq!(vm.eval_str(&stop)?.to_string(), "[false 1]");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn paths() -> anyhow::Result<()> {
        let mut vm = fs_engine();
        assert_eq!(vm.eval_str("(fs-path-split \"/a/b\")")?.to_string(), r#"["/" "a" "b"]"#);
        assert_eq!(vm.eval_str("(fs-path-split \"a/b\")")?.to_string(), r#"["" "a" "b"]"#);
        assert_eq!(
            vm.eval_str("(fs-path-join \"a\" [\"b\" \"c\"] \"/d.txt\")")?,
            Value::string("a/b/c/d.txt")
        );
        assert_eq!(vm.eval_str("(string? (fs-cwd))")?, Value::Bool(true));
        Ok(())
    }
}
