//! ABI access and argument encoding
//!
//! [`Abi`] wraps alloy's `JsonAbi` with the handful of operations the
//! deployer needs: encode constructor arguments, encode and decode function
//! calls. Arguments arrive as JSON values (from plan files) and are typed by
//! the ABI through [`json_to_sol_value`].

use alloy::dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt, Specifier};
use alloy::json_abi::{Function, JsonAbi, Param, StateMutability};
use alloy::primitives::{Address, Bytes, B256, I256, U256};
use serde_json::Value;

use crate::error::{Error, Result};

type ConvResult<T> = std::result::Result<T, String>;

/// A parsed contract ABI
#[derive(Debug, Clone, PartialEq)]
pub struct Abi(JsonAbi);

impl Abi {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map(Self)
            .map_err(|e| Error::AbiParse(e.to_string()))
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map(Self)
            .map_err(|e| Error::AbiParse(e.to_string()))
    }

    pub fn inner(&self) -> &JsonAbi {
        &self.0
    }

    /// Declared constructor parameters (empty without a constructor)
    pub fn constructor_inputs(&self) -> &[Param] {
        self.0
            .constructor
            .as_ref()
            .map(|c| c.inputs.as_slice())
            .unwrap_or_default()
    }

    pub fn has_constructor_with_args(&self) -> bool {
        !self.constructor_inputs().is_empty()
    }

    pub fn constructor_is_payable(&self) -> bool {
        self.0
            .constructor
            .as_ref()
            .is_some_and(|c| c.state_mutability == StateMutability::Payable)
    }

    /// ABI-encode constructor arguments.
    ///
    /// Fails with [`Error::Encoding`] when the number of arguments does not
    /// match the constructor, or when any value does not fit its declared type.
    pub fn encode_constructor_args(&self, args: &[Value]) -> Result<Vec<u8>> {
        if self.0.constructor.is_none() && !args.is_empty() {
            return Err(Error::Encoding(format!(
                "Contract has no constructor but {} argument(s) were provided",
                args.len()
            )));
        }

        let values = encode_values(self.constructor_inputs(), args)?;
        if values.is_empty() {
            return Ok(Vec::new());
        }
        Ok(DynSolValue::Tuple(values).abi_encode_params())
    }

    /// First overload of `name`
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.0.functions.get(name).and_then(|funcs| funcs.first())
    }

    /// The overload of `name` taking exactly `arity` arguments
    pub fn function_with_arity(&self, name: &str, arity: usize) -> Option<&Function> {
        self.0
            .functions
            .get(name)
            .and_then(|funcs| funcs.iter().find(|f| f.inputs.len() == arity))
    }

    /// True if the matching overload is `view` or `pure`
    pub fn is_read_only(&self, name: &str, arity: usize) -> bool {
        self.function_with_arity(name, arity)
            .is_some_and(is_read_only)
    }

    /// Encode calldata (selector + arguments), choosing the overload by arity
    pub fn encode_call(&self, name: &str, args: &[Value]) -> Result<(Function, Bytes)> {
        let Some(function) = self.function_with_arity(name, args.len()) else {
            return Err(match self.function(name) {
                Some(function) => Error::Encoding(format!(
                    "{} expects {} argument(s), got {}",
                    function.signature(),
                    function.inputs.len(),
                    args.len()
                )),
                None => Error::FunctionNotFound(name.to_string()),
            });
        };

        let values = encode_values(&function.inputs, args)?;
        let data = function
            .abi_encode_input(&values)
            .map_err(|e| Error::Encoding(format!("{}: {}", function.signature(), e)))?;

        Ok((function.clone(), Bytes::from(data)))
    }

    /// Decode the return data of `function` to JSON values
    pub fn decode_output(function: &Function, data: &[u8]) -> Result<Vec<Value>> {
        let values = function
            .abi_decode_output(data)
            .map_err(|e| Error::Encoding(format!("{}: {}", function.signature(), e)))?;
        Ok(values.iter().map(sol_value_to_json).collect())
    }
}

pub(crate) fn is_read_only(function: &Function) -> bool {
    matches!(
        function.state_mutability,
        StateMutability::View | StateMutability::Pure
    )
}

fn encode_values(inputs: &[Param], args: &[Value]) -> Result<Vec<DynSolValue>> {
    if inputs.len() != args.len() {
        return Err(Error::Encoding(format!(
            "Expected {} argument(s), got {}",
            inputs.len(),
            args.len()
        )));
    }

    let mut values = Vec::with_capacity(args.len());
    for (i, (input, value)) in inputs.iter().zip(args).enumerate() {
        let label = match input.name.as_str() {
            "" => format!("#{}", i),
            name => format!("#{} '{}'", i, name),
        };
        let ty = input
            .resolve()
            .map_err(|e| Error::Encoding(format!("Argument {} ({}): {}", label, input.ty, e)))?;
        let sol = json_to_sol_value(&ty, value)
            .map_err(|e| Error::Encoding(format!("Argument {}: {}", label, e)))?;
        values.push(sol);
    }
    Ok(values)
}

/// Convert a JSON value to a Solidity value of the given type.
///
/// Numbers may be JSON numbers or decimal/hex strings, byte strings are
/// 0x-hex, arrays and tuples are JSON arrays.
pub fn json_to_sol_value(ty: &DynSolType, value: &Value) -> ConvResult<DynSolValue> {
    let sol = match ty {
        DynSolType::Address => {
            let s = expect_str(value, "address")?;
            let address = s
                .parse::<Address>()
                .map_err(|e| format!("Invalid address '{}': {}", s, e))?;
            DynSolValue::Address(address)
        }
        DynSolType::Bool => match value {
            Value::Bool(b) => DynSolValue::Bool(*b),
            Value::String(s) if s == "true" => DynSolValue::Bool(true),
            Value::String(s) if s == "false" => DynSolValue::Bool(false),
            other => return Err(format!("Expected boolean, got {}", other)),
        },
        DynSolType::Uint(bits) => {
            let n = parse_uint(value)?;
            if n.bit_len() > *bits {
                return Err(format!("Value {} does not fit in uint{}", n, bits));
            }
            DynSolValue::Uint(n, *bits)
        }
        DynSolType::Int(bits) => {
            let n = parse_int(value)?;
            // Two's complement: -2^(bits-1) ..= 2^(bits-1) - 1
            let magnitude = if n.is_negative() {
                n.unsigned_abs() - U256::from(1)
            } else {
                n.unsigned_abs()
            };
            if magnitude.bit_len() >= *bits {
                return Err(format!("Value {} does not fit in int{}", n, bits));
            }
            DynSolValue::Int(n, *bits)
        }
        DynSolType::Bytes => DynSolValue::Bytes(parse_hex(value)?.to_vec()),
        DynSolType::String => DynSolValue::String(expect_str(value, "string")?.to_string()),
        DynSolType::FixedBytes(size) => {
            let bytes = parse_hex(value)?;
            if bytes.len() != *size {
                return Err(format!("Expected {} bytes, got {}", size, bytes.len()));
            }
            DynSolValue::FixedBytes(B256::right_padding_from(&bytes), *size)
        }
        DynSolType::Array(inner) => {
            let items = expect_array(value, None)?;
            DynSolValue::Array(convert_all(std::iter::repeat(inner.as_ref()), items)?)
        }
        DynSolType::FixedArray(inner, len) => {
            let items = expect_array(value, Some(*len))?;
            DynSolValue::FixedArray(convert_all(std::iter::repeat(inner.as_ref()), items)?)
        }
        DynSolType::Tuple(types) => {
            let items = expect_array(value, Some(types.len()))?;
            DynSolValue::Tuple(convert_all(types.iter(), items)?)
        }
        other => return Err(format!("Unsupported type: {}", other)),
    };
    Ok(sol)
}

fn expect_str<'v>(value: &'v Value, what: &str) -> ConvResult<&'v str> {
    value
        .as_str()
        .ok_or_else(|| format!("Expected string for {}, got {}", what, value))
}

fn expect_array(value: &Value, len: Option<usize>) -> ConvResult<&[Value]> {
    let items = value
        .as_array()
        .ok_or_else(|| format!("Expected array, got {}", value))?;
    match len {
        Some(len) if items.len() != len => {
            Err(format!("Expected {} elements, got {}", len, items.len()))
        }
        _ => Ok(items),
    }
}

fn parse_hex(value: &Value) -> ConvResult<Bytes> {
    let s = expect_str(value, "bytes")?;
    s.parse::<Bytes>()
        .map_err(|e| format!("Invalid hex '{}': {}", s, e))
}

fn convert_all<'t>(
    types: impl Iterator<Item = &'t DynSolType>,
    items: &[Value],
) -> ConvResult<Vec<DynSolValue>> {
    types
        .zip(items)
        .map(|(ty, item)| json_to_sol_value(ty, item))
        .collect()
}

/// Convert a decoded Solidity value to JSON. Integers become decimal strings
/// so no precision is lost.
pub fn sol_value_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Uint(n, _) => Value::String(n.to_string()),
        DynSolValue::Int(n, _) => Value::String(n.to_string()),
        DynSolValue::Address(addr) => Value::String(addr.to_checksum(None)),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word[..*size])))
        }
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(values)
        | DynSolValue::FixedArray(values)
        | DynSolValue::Tuple(values) => Value::Array(values.iter().map(sol_value_to_json).collect()),
        other => Value::String(format!("{:?}", other)),
    }
}

/// Unsigned integer from a JSON number or a decimal / 0x-hex string
pub fn parse_uint(value: &Value) -> ConvResult<U256> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("Invalid uint: {}", n)),
        Value::String(s) => s
            .trim()
            .parse::<U256>()
            .map_err(|e| format!("Invalid uint '{}': {}", s, e)),
        other => Err(format!("Expected number or string for uint, got {}", other)),
    }
}

/// Signed integer from a JSON number or a decimal string
pub fn parse_int(value: &Value) -> ConvResult<I256> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|i| I256::try_from(i).ok())
            .ok_or_else(|| format!("Invalid int: {}", n)),
        Value::String(s) => s
            .trim()
            .parse::<I256>()
            .map_err(|e| format!("Invalid int '{}': {}", s, e)),
        other => Err(format!("Expected number or string for int, got {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ORACLE_ABI: &str = r#"[
        {
            "type": "constructor",
            "inputs": [
                {"name": "valueProvider_", "type": "address"},
                {"name": "timeUpdateWindow_", "type": "uint256"},
                {"name": "maxValidTime_", "type": "uint256"},
                {"name": "alpha_", "type": "int256"}
            ],
            "stateMutability": "nonpayable"
        },
        {
            "type": "function",
            "name": "value",
            "inputs": [],
            "outputs": [
                {"name": "", "type": "int256"},
                {"name": "", "type": "bool"}
            ],
            "stateMutability": "view"
        },
        {
            "type": "function",
            "name": "update",
            "inputs": [],
            "outputs": [{"name": "", "type": "bool"}],
            "stateMutability": "nonpayable"
        },
        {
            "type": "function",
            "name": "oracleAdd",
            "inputs": [{"name": "oracle", "type": "address"}],
            "outputs": [],
            "stateMutability": "nonpayable"
        }
    ]"#;

    fn oracle_args() -> Vec<Value> {
        vec![
            json!("0x65748E8287Ce4B9E6D83EE853431958851550311"),
            json!("600"),
            json!("1200"),
            json!("100000000000000000"),
        ]
    }

    #[test]
    fn test_parse_abi() {
        let abi = Abi::parse(ORACLE_ABI).unwrap();
        assert_eq!(abi.inner().functions.len(), 3);
        assert!(abi.has_constructor_with_args());
        assert!(!abi.constructor_is_payable());
        assert_eq!(abi.constructor_inputs()[0].name, "valueProvider_");
    }

    #[test]
    fn test_parse_abi_invalid() {
        let err = Abi::parse("{not json").unwrap_err();
        assert!(matches!(err, Error::AbiParse(_)));
    }

    #[test]
    fn test_encode_constructor_args() {
        let abi = Abi::parse(ORACLE_ABI).unwrap();
        let encoded = abi.encode_constructor_args(&oracle_args()).unwrap();

        // Four static words
        assert_eq!(encoded.len(), 4 * 32);
        assert_eq!(
            &encoded[12..32],
            &hex::decode("65748E8287Ce4B9E6D83EE853431958851550311").unwrap()[..]
        );
        assert_eq!(U256::from_be_slice(&encoded[32..64]), U256::from(600));
        assert_eq!(U256::from_be_slice(&encoded[64..96]), U256::from(1200));
        assert_eq!(
            U256::from_be_slice(&encoded[96..128]),
            U256::from(100_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_encode_constructor_arity_mismatch() {
        let abi = Abi::parse(ORACLE_ABI).unwrap();
        let err = abi.encode_constructor_args(&oracle_args()[..2]).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn test_encode_constructor_type_mismatch() {
        let abi = Abi::parse(ORACLE_ABI).unwrap();
        let mut args = oracle_args();
        args[0] = json!("not-an-address");
        let err = abi.encode_constructor_args(&args).unwrap_err();
        assert!(err.to_string().contains("valueProvider_"));
    }

    #[test]
    fn test_encode_without_constructor() {
        let abi = Abi::parse("[]").unwrap();
        assert!(abi.encode_constructor_args(&[]).unwrap().is_empty());
        assert!(abi.encode_constructor_args(&[json!("1")]).is_err());
    }

    #[test]
    fn test_encode_call() {
        let abi = Abi::parse(ORACLE_ABI).unwrap();
        let (function, data) = abi
            .encode_call("oracleAdd", &[json!("0x65748E8287Ce4B9E6D83EE853431958851550311")])
            .unwrap();

        assert_eq!(function.signature(), "oracleAdd(address)");
        assert_eq!(&data[..4], function.selector().as_slice());
        assert_eq!(data.len(), 4 + 32);
    }

    #[test]
    fn test_encode_call_unknown_function() {
        let abi = Abi::parse(ORACLE_ABI).unwrap();
        let err = abi.encode_call("missing", &[]).unwrap_err();
        assert!(matches!(err, Error::FunctionNotFound(_)));
    }

    #[test]
    fn test_encode_call_wrong_arity() {
        let abi = Abi::parse(ORACLE_ABI).unwrap();
        let err = abi.encode_call("oracleAdd", &[]).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn test_is_read_only() {
        let abi = Abi::parse(ORACLE_ABI).unwrap();
        assert!(abi.is_read_only("value", 0));
        assert!(!abi.is_read_only("update", 0));
        assert!(!abi.is_read_only("value", 1));
        assert!(!abi.is_read_only("missing", 0));
    }

    #[test]
    fn test_decode_output() {
        let abi = Abi::parse(ORACLE_ABI).unwrap();
        let function = abi.function("value").unwrap();
        let data = DynSolValue::Tuple(vec![
            DynSolValue::Int(I256::try_from(42i64).unwrap(), 256),
            DynSolValue::Bool(true),
        ])
        .abi_encode_params();

        let values = Abi::decode_output(function, &data).unwrap();
        assert_eq!(values, vec![json!("42"), json!(true)]);
    }

    #[test]
    fn test_json_to_sol_fixed_bytes() {
        let pool_id = "0x4294005520c453eb8fa66f53042cfc79707855c400020000000000000000009a";
        let value = json_to_sol_value(&DynSolType::FixedBytes(32), &json!(pool_id)).unwrap();
        assert_eq!(sol_value_to_json(&value), json!(pool_id));

        let short = json_to_sol_value(&DynSolType::FixedBytes(4), &json!("0xdeadbeef")).unwrap();
        assert_eq!(sol_value_to_json(&short), json!("0xdeadbeef"));

        assert!(json_to_sol_value(&DynSolType::FixedBytes(4), &json!("0xdead")).is_err());
    }

    #[test]
    fn test_json_to_sol_uint_bounds() {
        assert!(json_to_sol_value(&DynSolType::Uint(8), &json!(255)).is_ok());
        assert!(json_to_sol_value(&DynSolType::Uint(8), &json!(256)).is_err());
        assert!(json_to_sol_value(&DynSolType::Uint(256), &json!(-1)).is_err());
        assert!(json_to_sol_value(&DynSolType::Uint(256), &json!("0x10")).is_ok());
    }

    #[test]
    fn test_json_to_sol_int_bounds() {
        assert!(json_to_sol_value(&DynSolType::Int(8), &json!(127)).is_ok());
        assert!(json_to_sol_value(&DynSolType::Int(8), &json!(-128)).is_ok());
        assert!(json_to_sol_value(&DynSolType::Int(8), &json!(128)).is_err());
        assert!(json_to_sol_value(&DynSolType::Int(8), &json!(-129)).is_err());
        assert!(json_to_sol_value(&DynSolType::Int(8), &json!(1000)).is_err());
        assert!(json_to_sol_value(&DynSolType::Int(8), &json!("1000")).is_err());
        assert!(json_to_sol_value(&DynSolType::Int(256), &json!(i64::MIN)).is_ok());
    }

    #[test]
    fn test_encode_constructor_int_out_of_range() {
        let abi = Abi::parse(
            r#"[{"type":"constructor","inputs":[{"name":"x","type":"int8"}],"stateMutability":"nonpayable"}]"#,
        )
        .unwrap();
        let err = abi.encode_constructor_args(&[json!("1000")]).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
        assert_eq!(abi.encode_constructor_args(&[json!(-3)]).unwrap().len(), 32);
    }

    #[test]
    fn test_json_to_sol_int() {
        let value = json_to_sol_value(&DynSolType::Int(256), &json!(-5)).unwrap();
        assert_eq!(sol_value_to_json(&value), json!("-5"));
    }

    #[test]
    fn test_json_to_sol_bool_strings() {
        assert_eq!(
            json_to_sol_value(&DynSolType::Bool, &json!("true")).unwrap(),
            DynSolValue::Bool(true)
        );
        assert!(json_to_sol_value(&DynSolType::Bool, &json!("yes")).is_err());
    }

    #[test]
    fn test_json_to_sol_tuple_and_array() {
        let ty: DynSolType = "(uint256,bool)[]".parse().unwrap();
        let value = json_to_sol_value(&ty, &json!([["1", true], [2, "false"]])).unwrap();
        assert_eq!(
            sol_value_to_json(&value),
            json!([["1", true], ["2", false]])
        );

        let fixed: DynSolType = "address[2]".parse().unwrap();
        assert!(json_to_sol_value(&fixed, &json!(["0x65748E8287Ce4B9E6D83EE853431958851550311"])).is_err());
    }
}
