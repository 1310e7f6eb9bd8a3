//! The imported-package registry.
//!
//! A `Package` is a flat bundle of name→value binds, name→type entries,
//! and name→proxy-type entries. The registry is read-mostly: packages are
//! materialized on first import and cached in the session's shared state.
//!
//! The native packages below expose a small host-library surface:
//! `strings`, `math`, and `math/rand` (backed by a seedable generator).

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::env::Env;
use crate::error::{EvalError, Flow, Unwind};
use crate::types::{self, Kind, StructField, Type};
use crate::value::{FuncImpl, FuncVal, NativeFunc, PackageRef, Value, Values};

/// One registered package: binds, types and proxy types.
#[derive(Default)]
pub struct Package {
    pub binds: AHashMap<Rc<str>, Value>,
    pub types: AHashMap<Rc<str>, Type>,
    pub proxies: AHashMap<Rc<str>, Type>,
}

/// Resolves an import path to a package reference, building and caching
/// native packages on first use.
pub fn lookup_package(env: &Rc<Env>, path: &str) -> Option<Rc<PackageRef>> {
    if let Some(found) = env.shared.packages.borrow().get(path) {
        return Some(found.clone());
    }
    let (name, pkg) = match path {
        "strings" => ("strings", strings_package()),
        "math" => ("math", math_package()),
        "math/rand" => ("rand", rand_package()),
        _ => return None,
    };
    let reference = Rc::new(PackageRef {
        name: Rc::from(name),
        path: Rc::from(path),
        pkg,
    });
    env.shared
        .packages
        .borrow_mut()
        .insert(Rc::from(path), reference.clone());
    Some(reference)
}

fn native(name: &'static str, arg_num: i32, f: fn(&Rc<Env>, Vec<Value>) -> Flow<Values>) -> Value {
    Value::Func(FuncVal::new(
        types::func_of(vec![], vec![], false),
        FuncImpl::Native(NativeFunc { name, arg_num, f }),
    ))
}

fn one(v: Value) -> Flow<Values> {
    Ok(Values::from_iter([v]))
}

fn want_str(fname: &str, v: &Value) -> Result<Rc<str>, Unwind> {
    match v {
        Value::Str(s) => Ok(s.clone()),
        other => Err(EvalError::type_(format!("{fname}: expecting string, found {other:?}")).into()),
    }
}

fn want_f64(fname: &str, v: &Value) -> Result<f64, Unwind> {
    v.as_f64()
        .ok_or_else(|| EvalError::type_(format!("{fname}: expecting number, found {v:?}")).into())
}

fn want_int(fname: &str, v: &Value) -> Result<i64, Unwind> {
    v.as_int()
        .ok_or_else(|| EvalError::type_(format!("{fname}: expecting integer, found {v:?}")).into())
}

fn strings_package() -> Package {
    let mut pkg = Package::default();
    let binds: &[(&str, i32, fn(&Rc<Env>, Vec<Value>) -> Flow<Values>)] = &[
        ("Contains", 2, |_, args| {
            let (s, sub) = (want_str("Contains", &args[0])?, want_str("Contains", &args[1])?);
            one(Value::Bool(s.contains(&*sub)))
        }),
        ("HasPrefix", 2, |_, args| {
            let (s, p) = (want_str("HasPrefix", &args[0])?, want_str("HasPrefix", &args[1])?);
            one(Value::Bool(s.starts_with(&*p)))
        }),
        ("HasSuffix", 2, |_, args| {
            let (s, p) = (want_str("HasSuffix", &args[0])?, want_str("HasSuffix", &args[1])?);
            one(Value::Bool(s.ends_with(&*p)))
        }),
        ("Index", 2, |_, args| {
            let (s, sub) = (want_str("Index", &args[0])?, want_str("Index", &args[1])?);
            let idx = s.find(&*sub).map_or(-1, |i| i as i64);
            one(Value::int(idx))
        }),
        ("Join", 2, |_, args| {
            let sep = want_str("Join", &args[1])?;
            let parts = match &args[0] {
                Value::Slice(s) | Value::Array(s) => s.to_vec(),
                other => return Err(EvalError::type_(format!("Join: expecting slice, found {other:?}")).into()),
            };
            let mut joined = Vec::with_capacity(parts.len());
            for part in &parts {
                joined.push(want_str("Join", part)?.to_string());
            }
            one(Value::str(joined.join(&*sep)))
        }),
        ("Repeat", 2, |_, args| {
            let s = want_str("Repeat", &args[0])?;
            let n = want_int("Repeat", &args[1])?;
            if n < 0 {
                return Err(Unwind::Panic(Value::str("strings: negative Repeat count")));
            }
            one(Value::str(s.repeat(n as usize)))
        }),
        ("Split", 2, |_, args| {
            let (s, sep) = (want_str("Split", &args[0])?, want_str("Split", &args[1])?);
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::str(c.to_string())).collect()
            } else {
                s.split(&*sep).map(Value::str).collect()
            };
            one(Value::new_slice(types::slice_of(types::primitive(Kind::String)), parts))
        }),
        ("ToLower", 1, |_, args| one(Value::str(want_str("ToLower", &args[0])?.to_lowercase()))),
        ("ToUpper", 1, |_, args| one(Value::str(want_str("ToUpper", &args[0])?.to_uppercase()))),
        ("TrimSpace", 1, |_, args| one(Value::str(want_str("TrimSpace", &args[0])?.trim()))),
    ];
    for &(name, argn, f) in binds {
        pkg.binds.insert(Rc::from(name), native(name, argn, f));
    }
    pkg
}

fn math_package() -> Package {
    let mut pkg = Package::default();
    let unary: &[(&str, fn(&Rc<Env>, Vec<Value>) -> Flow<Values>)] = &[
        ("Abs", |_, args| one(Value::float64(want_f64("Abs", &args[0])?.abs()))),
        ("Ceil", |_, args| one(Value::float64(want_f64("Ceil", &args[0])?.ceil()))),
        ("Floor", |_, args| one(Value::float64(want_f64("Floor", &args[0])?.floor()))),
        ("Sqrt", |_, args| one(Value::float64(want_f64("Sqrt", &args[0])?.sqrt()))),
    ];
    for &(name, f) in unary {
        pkg.binds.insert(Rc::from(name), native(name, 1, f));
    }
    pkg.binds.insert(
        Rc::from("Max"),
        native("Max", 2, |_, args| {
            one(Value::float64(want_f64("Max", &args[0])?.max(want_f64("Max", &args[1])?)))
        }),
    );
    pkg.binds.insert(
        Rc::from("Min"),
        native("Min", 2, |_, args| {
            one(Value::float64(want_f64("Min", &args[0])?.min(want_f64("Min", &args[1])?)))
        }),
    );
    pkg.binds.insert(
        Rc::from("Mod"),
        native("Mod", 2, |_, args| {
            let (x, y) = (want_f64("Mod", &args[0])?, want_f64("Mod", &args[1])?);
            one(Value::float64(x % y))
        }),
    );
    pkg.binds.insert(
        Rc::from("Pow"),
        native("Pow", 2, |_, args| {
            let (x, y) = (want_f64("Pow", &args[0])?, want_f64("Pow", &args[1])?);
            one(Value::float64(x.powf(y)))
        }),
    );
    pkg.binds.insert(Rc::from("Pi"), Value::float64(std::f64::consts::PI));
    pkg.binds.insert(Rc::from("E"), Value::float64(std::f64::consts::E));
    pkg.binds
        .insert(Rc::from("MaxInt64"), Value::Int(Kind::Int64, i64::MAX));
    pkg.binds
        .insert(Rc::from("MinInt64"), Value::Int(Kind::Int64, i64::MIN));
    pkg
}

thread_local! {
    static RNG: RefCell<StdRng> = RefCell::new(StdRng::seed_from_u64(1));
}

fn rand_package() -> Package {
    let mut pkg = Package::default();
    pkg.binds.insert(
        Rc::from("Float64"),
        native("Float64", 0, |_, _| one(Value::float64(RNG.with(|r| r.borrow_mut().gen::<f64>())))),
    );
    pkg.binds.insert(
        Rc::from("Int63"),
        native("Int63", 0, |_, _| {
            one(Value::Int(Kind::Int64, RNG.with(|r| r.borrow_mut().gen_range(0..i64::MAX))))
        }),
    );
    pkg.binds.insert(
        Rc::from("Intn"),
        native("Intn", 1, |_, args| {
            let n = want_int("Intn", &args[0])?;
            if n <= 0 {
                return Err(Unwind::Panic(Value::str("invalid argument to Intn")));
            }
            one(Value::int(RNG.with(|r| r.borrow_mut().gen_range(0..n))))
        }),
    );
    pkg.binds.insert(
        Rc::from("Perm"),
        native("Perm", 1, |_, args| {
            let n = want_int("Perm", &args[0])?.max(0) as usize;
            let mut perm: Vec<usize> = (0..n).collect();
            RNG.with(|r| {
                let mut rng = r.borrow_mut();
                for i in (1..n).rev() {
                    let j = rng.gen_range(0..=i);
                    perm.swap(i, j);
                }
            });
            let elems = perm.into_iter().map(|i| Value::int(i as i64)).collect();
            one(Value::new_slice(types::slice_of(types::primitive(Kind::Int)), elems))
        }),
    );
    pkg.binds.insert(
        Rc::from("Seed"),
        native("Seed", 1, |_, args| {
            let seed = want_int("Seed", &args[0])?;
            RNG.with(|r| *r.borrow_mut() = StdRng::seed_from_u64(seed as u64));
            Ok(Values::new())
        }),
    );
    pkg.binds.insert(
        Rc::from("Shuffle"),
        native("Shuffle", 2, |env, args| {
            let n = want_int("Shuffle", &args[0])?;
            let swap = args[1].clone();
            for i in (1..n).rev() {
                let j = RNG.with(|r| r.borrow_mut().gen_range(0..=i));
                crate::call::call_value(env, &swap, vec![Value::int(i), Value::int(j)], crate::token::Pos::NONE)?;
            }
            Ok(Values::new())
        }),
    );
    // the Source interface and its proxy shape: one closure slot per
    // method plus the opaque object slot
    let source = types::interface_of(vec![Rc::from("Int63"), Rc::from("Seed")]);
    let proxy = types::struct_of(vec![
        StructField {
            name: Rc::from("Object"),
            ty: types::empty_interface(),
        },
        StructField {
            name: Rc::from("Int63_"),
            ty: types::func_of(vec![], vec![types::primitive(Kind::Int64)], false),
        },
        StructField {
            name: Rc::from("Seed_"),
            ty: types::func_of(vec![types::primitive(Kind::Int64)], vec![], false),
        },
    ]);
    pkg.types.insert(Rc::from("Source"), source);
    pkg.proxies.insert(Rc::from("Source"), proxy);
    pkg
}
