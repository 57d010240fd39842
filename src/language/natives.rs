//=============================================
// nodlang/language/natives.rs
//=============================================
// Author: Nodlang Contributors
// License: Duality Public License (DPL v1.0)
// Goal: Native function library
// Objective: Operators, math and string helpers callable from graph nodes
// Formatting: Zobie.format (.solvraformat)
//=============================================

//=============================================
//            Section 1: Imports & Errors
//=============================================

use super::Language;
use super::types::{Type, Value};
use thiserror::Error;

/// Failure raised by a native function while the VM invokes it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NativeError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("argument {index} expected {expected}, found {found}")]
    ArgumentType {
        index: usize,
        expected: Type,
        found: Type,
    },
    #[error("missing argument {0}")]
    MissingArgument(usize),
}

/// Native entry point. Arguments passed by reference are read back from the
/// slice after the call.
pub type NativeFn = fn(&mut [Value]) -> Result<Value, NativeError>;

//=============================================
//            Section 2: Argument Helpers
//=============================================

fn arg(args: &[Value], index: usize) -> Result<&Value, NativeError> {
    args.get(index).ok_or(NativeError::MissingArgument(index))
}

fn mismatch(args: &[Value], index: usize, expected: Type) -> NativeError {
    NativeError::ArgumentType {
        index,
        expected,
        found: args.get(index).map(Value::ty).unwrap_or(Type::Null),
    }
}

fn int(args: &[Value], index: usize) -> Result<i32, NativeError> {
    arg(args, index)?
        .as_int()
        .ok_or_else(|| mismatch(args, index, Type::Int))
}

fn double(args: &[Value], index: usize) -> Result<f64, NativeError> {
    arg(args, index)?
        .as_double()
        .ok_or_else(|| mismatch(args, index, Type::Double))
}

fn boolean(args: &[Value], index: usize) -> Result<bool, NativeError> {
    match arg(args, index)? {
        Value::Bool(b) => Ok(*b),
        _ => Err(mismatch(args, index, Type::Bool)),
    }
}

fn string(args: &[Value], index: usize) -> Result<String, NativeError> {
    match arg(args, index)? {
        Value::String(s) => Ok(s.clone()),
        _ => Err(mismatch(args, index, Type::String)),
    }
}

fn int_divide(a: i32, b: i32) -> Result<Value, NativeError> {
    if b == 0 {
        return Err(NativeError::DivisionByZero);
    }
    Ok(Value::Int(a.wrapping_div(b)))
}

fn double_divide(a: f64, b: f64) -> Result<Value, NativeError> {
    if b == 0.0 {
        return Err(NativeError::DivisionByZero);
    }
    Ok(Value::Double(a / b))
}

/// Store `value` into the by-reference slot and hand it back as the result.
fn assign(args: &mut [Value], value: Value) -> Result<Value, NativeError> {
    let slot = args.get_mut(0).ok_or(NativeError::MissingArgument(0))?;
    *slot = value.clone();
    Ok(value)
}

fn print(text: String) -> Result<Value, NativeError> {
    println!("print: {text}");
    Ok(Value::String(text))
}

//=============================================
//            Section 3: Registration
//=============================================

use super::types::Type::{Bool as B, Double as D, Int as I, String as S};

pub(crate) fn register_math(lang: &mut Language) {
    // addition
    lang.register_native("+", D, &[D, I], |a| Ok(Value::Double(double(a, 0)? + double(a, 1)?)));
    lang.register_native("+", D, &[D, D], |a| Ok(Value::Double(double(a, 0)? + double(a, 1)?)));
    lang.register_native("+", I, &[I, I], |a| Ok(Value::Int(int(a, 0)?.wrapping_add(int(a, 1)?))));
    lang.register_native("+", I, &[I, D], |a| Ok(Value::Int(int(a, 0)?.wrapping_add(double(a, 1)? as i32))));
    lang.register_native("+", S, &[S, S], |a| Ok(Value::String(string(a, 0)? + &string(a, 1)?)));
    lang.register_native("+", S, &[S, I], |a| Ok(Value::String(format!("{}{}", string(a, 0)?, int(a, 1)?))));
    lang.register_native("+", S, &[S, D], |a| Ok(Value::String(format!("{}{}", string(a, 0)?, double(a, 1)?))));

    // logic
    lang.register_native("||", B, &[B, B], |a| Ok(Value::Bool(boolean(a, 0)? || boolean(a, 1)?)));
    lang.register_native("&&", B, &[B, B], |a| Ok(Value::Bool(boolean(a, 0)? && boolean(a, 1)?)));
    lang.register_native("!", B, &[B], |a| Ok(Value::Bool(!boolean(a, 0)?)));
    lang.register_native("=>", B, &[B, B], |a| Ok(Value::Bool(!boolean(a, 0)? || boolean(a, 1)?)));

    // subtraction and negation
    lang.register_native("-", D, &[D], |a| Ok(Value::Double(-double(a, 0)?)));
    lang.register_native("-", I, &[I], |a| Ok(Value::Int(int(a, 0)?.wrapping_neg())));
    lang.register_native("-", D, &[D, D], |a| Ok(Value::Double(double(a, 0)? - double(a, 1)?)));
    lang.register_native("-", D, &[D, I], |a| Ok(Value::Double(double(a, 0)? - double(a, 1)?)));
    lang.register_native("-", I, &[I, I], |a| Ok(Value::Int(int(a, 0)?.wrapping_sub(int(a, 1)?))));
    lang.register_native("-", I, &[I, D], |a| Ok(Value::Int(int(a, 0)?.wrapping_sub(double(a, 1)? as i32))));

    // division
    lang.register_native("/", D, &[D, D], |a| double_divide(double(a, 0)?, double(a, 1)?));
    lang.register_native("/", D, &[D, I], |a| double_divide(double(a, 0)?, double(a, 1)?));
    lang.register_native("/", I, &[I, I], |a| int_divide(int(a, 0)?, int(a, 1)?));
    lang.register_native("/", I, &[I, D], |a| int_divide(int(a, 0)?, double(a, 1)? as i32));

    // multiplication
    lang.register_native("*", D, &[D, D], |a| Ok(Value::Double(double(a, 0)? * double(a, 1)?)));
    lang.register_native("*", D, &[D, I], |a| Ok(Value::Double(double(a, 0)? * double(a, 1)?)));
    lang.register_native("*", I, &[I, I], |a| Ok(Value::Int(int(a, 0)?.wrapping_mul(int(a, 1)?))));
    lang.register_native("*", I, &[I, D], |a| Ok(Value::Int(int(a, 0)?.wrapping_mul(double(a, 1)? as i32))));

    // comparison
    lang.register_native(">=", B, &[D, D], |a| Ok(Value::Bool(double(a, 0)? >= double(a, 1)?)));
    lang.register_native(">=", B, &[D, I], |a| Ok(Value::Bool(double(a, 0)? >= double(a, 1)?)));
    lang.register_native(">=", B, &[I, D], |a| Ok(Value::Bool(double(a, 0)? >= double(a, 1)?)));
    lang.register_native(">=", B, &[I, I], |a| Ok(Value::Bool(int(a, 0)? >= int(a, 1)?)));
    lang.register_native("<=", B, &[D, I], |a| Ok(Value::Bool(double(a, 0)? <= double(a, 1)?)));
    lang.register_native("<=", B, &[D, D], |a| Ok(Value::Bool(double(a, 0)? <= double(a, 1)?)));
    lang.register_native("<=", B, &[I, I], |a| Ok(Value::Bool(int(a, 0)? <= int(a, 1)?)));
    lang.register_native("<=", B, &[I, D], |a| Ok(Value::Bool(double(a, 0)? <= double(a, 1)?)));

    // assignment, left operand by reference
    lang.register_assign(S, S, |a| {
        let value = Value::String(string(a, 1)?);
        assign(a, value)
    });
    lang.register_assign(B, B, |a| {
        let value = Value::Bool(boolean(a, 1)?);
        assign(a, value)
    });
    lang.register_assign(D, I, |a| {
        let value = Value::Double(double(a, 1)?);
        assign(a, value)
    });
    lang.register_assign(D, D, |a| {
        let value = Value::Double(double(a, 1)?);
        assign(a, value)
    });
    lang.register_assign(I, I, |a| {
        let value = Value::Int(int(a, 1)?);
        assign(a, value)
    });
    lang.register_assign(I, D, |a| {
        let value = Value::Int(double(a, 1)? as i32);
        assign(a, value)
    });

    // equality
    lang.register_native("==", B, &[I, I], |a| Ok(Value::Bool(int(a, 0)? == int(a, 1)?)));
    lang.register_native("==", B, &[D, D], |a| Ok(Value::Bool(double(a, 0)? == double(a, 1)?)));
    lang.register_native("==", B, &[S, S], |a| Ok(Value::Bool(string(a, 0)? == string(a, 1)?)));
    lang.register_native("<=>", B, &[B, B], |a| Ok(Value::Bool(boolean(a, 0)? == boolean(a, 1)?)));
    lang.register_native("!=", B, &[B, B], |a| Ok(Value::Bool(boolean(a, 0)? != boolean(a, 1)?)));
    lang.register_native("!=", B, &[I, I], |a| Ok(Value::Bool(int(a, 0)? != int(a, 1)?)));
    lang.register_native("!=", B, &[D, D], |a| Ok(Value::Bool(double(a, 0)? != double(a, 1)?)));
    lang.register_native("!=", B, &[S, S], |a| Ok(Value::Bool(string(a, 0)? != string(a, 1)?)));
    lang.register_native(">", B, &[D, D], |a| Ok(Value::Bool(double(a, 0)? > double(a, 1)?)));
    lang.register_native(">", B, &[I, I], |a| Ok(Value::Bool(int(a, 0)? > int(a, 1)?)));
    lang.register_native("<", B, &[D, D], |a| Ok(Value::Bool(double(a, 0)? < double(a, 1)?)));
    lang.register_native("<", B, &[I, I], |a| Ok(Value::Bool(int(a, 0)? < int(a, 1)?)));

    // functions
    lang.register_native("return", B, &[B], |a| Ok(Value::Bool(boolean(a, 0)?)));
    lang.register_native("return", I, &[I], |a| Ok(Value::Int(int(a, 0)?)));
    lang.register_native("return", D, &[D], |a| Ok(Value::Double(double(a, 0)?)));
    lang.register_native("return", S, &[S], |a| Ok(Value::String(string(a, 0)?)));
    lang.register_native("sin", D, &[D], |a| Ok(Value::Double(double(a, 0)?.sin())));
    lang.register_native("cos", D, &[D], |a| Ok(Value::Double(double(a, 0)?.cos())));
    lang.register_native("mod", D, &[D, D], |a| Ok(Value::Double(double(a, 0)? % double(a, 1)?)));
    lang.register_native("sqrt", D, &[D], |a| Ok(Value::Double(double(a, 0)?.sqrt())));
    lang.register_native("sqrt", I, &[I], |a| Ok(Value::Int(double(a, 0)?.sqrt() as i32)));
    lang.register_native("pow", I, &[I, I], |a| Ok(Value::Int(double(a, 0)?.powf(double(a, 1)?) as i32)));
    lang.register_native("pow", D, &[D, D], |a| Ok(Value::Double(double(a, 0)?.powf(double(a, 1)?))));
    // true when the number is zero
    lang.register_native("to_bool", B, &[D], |a| Ok(Value::Bool(double(a, 0)? == 0.0)));
    lang.register_native("secondDegreePolynomial", D, &[D, D, D, D, D], |a| {
        let (ca, x, cb, y, cc) = (double(a, 0)?, double(a, 1)?, double(a, 2)?, double(a, 3)?, double(a, 4)?);
        Ok(Value::Double(ca * x * x + cb * y + cc))
    });
}

pub(crate) fn register_strings(lang: &mut Language) {
    lang.register_native("to_string", S, &[B], |a| Ok(Value::String(boolean(a, 0)?.to_string())));
    lang.register_native("to_string", S, &[D], |a| Ok(Value::String(Value::Double(double(a, 0)?).to_string())));
    lang.register_native("to_string", S, &[I], |a| Ok(Value::String(int(a, 0)?.to_string())));
    lang.register_native("to_string", S, &[S], |a| Ok(Value::String(string(a, 0)?)));
    lang.register_native("print", S, &[B], |a| print(boolean(a, 0)?.to_string()));
    lang.register_native("print", S, &[D], |a| print(Value::Double(double(a, 0)?).to_string()));
    lang.register_native("print", S, &[I], |a| print(int(a, 0)?.to_string()));
    lang.register_native("print", S, &[S], |a| print(string(a, 0)?));
}

//=============================================
//            Section 4: Tests
//=============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::signature::Signature;

    fn call(lang: &Language, identifier: &str, mut args: Vec<Value>) -> Result<Value, NativeError> {
        let types: Vec<Type> = args.iter().map(Value::ty).collect();
        let candidate = Signature::new(identifier, Type::Any).with_args(&types);
        let function = lang.find_function(&candidate).expect("native exists");
        (function.native)(&mut args)
    }

    #[test]
    fn integer_division_by_zero_fails() {
        let lang = Language::new();
        let err = call(&lang, "/", vec![Value::Int(4), Value::Int(0)]).expect_err("div by zero");
        assert_eq!(err, NativeError::DivisionByZero);
    }

    #[test]
    fn integer_division_overflow_wraps() {
        let lang = Language::new();
        let out = call(&lang, "/", vec![Value::Int(i32::MIN), Value::Int(-1)]).expect("wraps");
        assert_eq!(out, Value::Int(i32::MIN));
        let out = call(&lang, "/", vec![Value::Int(-7), Value::Int(2)]).expect("truncates");
        assert_eq!(out, Value::Int(-3));
    }

    #[test]
    fn string_concatenation_formats_numbers() {
        let lang = Language::new();
        let out = call(&lang, "+", vec![Value::String("n=".into()), Value::Int(3)]).expect("call");
        assert_eq!(out, Value::String("n=3".into()));
    }

    #[test]
    fn assign_writes_reference_slot() {
        let lang = Language::new();
        let mut args = vec![Value::Double(0.0), Value::Int(5)];
        let candidate = Signature::new("=", Type::Any).with_args(&[Type::Double, Type::Int]);
        let function = lang.find_function(&candidate).expect("assign exists");
        let out = (function.native)(&mut args).expect("call");
        assert_eq!(out, Value::Double(5.0));
        assert_eq!(args[0], Value::Double(5.0));
    }

    #[test]
    fn pow_and_sqrt_on_ints() {
        let lang = Language::new();
        assert_eq!(call(&lang, "pow", vec![Value::Int(2), Value::Int(10)]), Ok(Value::Int(1024)));
        assert_eq!(call(&lang, "sqrt", vec![Value::Int(81)]), Ok(Value::Int(9)));
    }
}
