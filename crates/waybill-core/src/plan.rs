//! Deployment plans
//!
//! A plan is a TOML document with an ordered `[[steps]]` array:
//!
//! ```toml
//! [[steps]]
//! action = "deploy"
//! name = "ElementOracle"
//! artifact = "src/oracle/Oracle.sol:Oracle"
//! args = ["${ElementVP}", "600", "1200", "100000000000000000"]
//!
//! [[steps]]
//! action = "call"
//! target = "ElementOracle"
//! function = "setParam"
//! args = ["minimumPercentageDeltaValue", "25"]
//! ```
//!
//! A string argument written exactly as `${Name}` is replaced by the address
//! of `Name` at execution time. Every such reference is a declared input of
//! the step, so steps run in dependency order rather than textual order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use alloy::primitives::Address;
use serde::Deserialize;
use serde_json::Value;

use crate::abi::parse_uint;
use crate::error::{Error, Result};
use crate::types::{ArtifactKey, TxOverrides};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentPlan {
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Step {
    Deploy(DeployStep),
    Call(CallStep),
}

/// Deploy `artifact` and record the address under `name`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployStep {
    pub name: String,
    pub artifact: ArtifactKey,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<Value>,
    pub value: Option<Value>,
}

/// Call `function` on a deployed contract
///
/// `target` is a step name, a ledger name or a literal address. `artifact`
/// supplies the ABI when the target was not deployed by this plan.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallStep {
    pub target: String,
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
    pub artifact: Option<ArtifactKey>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<Value>,
    pub value: Option<Value>,
}

/// Where a call step sends its transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    Named(String),
    Address(Address),
}

impl CallStep {
    pub fn target(&self) -> CallTarget {
        match self.target.parse::<Address>() {
            Ok(address) => CallTarget::Address(address),
            Err(_) => CallTarget::Named(reference(&self.target).unwrap_or(&self.target).to_string()),
        }
    }
}

impl Step {
    /// Human-readable identifier used in logs and errors
    pub fn label(&self) -> String {
        match self {
            Step::Deploy(step) => step.name.clone(),
            Step::Call(step) => format!("{}.{}", step.target, step.function),
        }
    }

    pub fn args(&self) -> &[Value] {
        match self {
            Step::Deploy(step) => &step.args,
            Step::Call(step) => &step.args,
        }
    }

    /// Names whose addresses must exist before this step runs
    pub fn inputs(&self) -> BTreeSet<String> {
        let mut inputs = BTreeSet::new();
        for arg in self.args() {
            collect_references(arg, &mut inputs);
        }
        match self {
            Step::Deploy(step) => inputs.extend(step.depends_on.iter().cloned()),
            Step::Call(step) => {
                inputs.extend(step.depends_on.iter().cloned());
                if let CallTarget::Named(name) = step.target() {
                    inputs.insert(name);
                }
            }
        }
        inputs
    }

    pub fn overrides(&self) -> Result<TxOverrides> {
        let (gas_limit, gas_price, value) = match self {
            Step::Deploy(s) => (s.gas_limit, &s.gas_price, &s.value),
            Step::Call(s) => (s.gas_limit, &s.gas_price, &s.value),
        };

        let gas_price = gas_price
            .as_ref()
            .map(|v| {
                parse_uint(v).and_then(|p| {
                    u128::try_from(p).map_err(|_| format!("gas price {} out of range", p))
                })
            })
            .transpose()
            .map_err(|e| Error::InvalidPlan(format!("{}: {}", self.label(), e)))?;
        let value = value
            .as_ref()
            .map(parse_uint)
            .transpose()
            .map_err(|e| Error::InvalidPlan(format!("{}: {}", self.label(), e)))?;

        Ok(TxOverrides {
            gas_limit,
            gas_price,
            value,
        })
    }
}

impl DeploymentPlan {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidPlan(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let plan: Self =
            toml::from_str(content).map_err(|e| Error::InvalidPlan(e.to_string()))?;
        plan.check_shape()?;
        Ok(plan)
    }

    /// Names produced by deploy steps, in declaration order
    pub fn deploy_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|step| match step {
            Step::Deploy(deploy) => Some(deploy.name.as_str()),
            Step::Call(_) => None,
        })
    }

    fn check_shape(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for step in &self.steps {
            match step {
                Step::Deploy(deploy) => {
                    if deploy.name.trim().is_empty() {
                        return Err(Error::InvalidPlan(format!(
                            "deploy step for {} has an empty name",
                            deploy.artifact
                        )));
                    }
                    if !seen.insert(deploy.name.as_str()) {
                        return Err(Error::InvalidPlan(format!(
                            "duplicate deploy name '{}'",
                            deploy.name
                        )));
                    }
                }
                Step::Call(call) => {
                    if call.function.trim().is_empty() {
                        return Err(Error::InvalidPlan(format!(
                            "call step on '{}' has an empty function",
                            call.target
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Steps in execution order.
    ///
    /// Each input must be produced by a deploy step or already be in
    /// `recorded`. Among steps whose inputs are satisfied, declaration order
    /// wins, so a plan without references runs top to bottom.
    pub fn execution_order(&self, recorded: &BTreeMap<String, Address>) -> Result<Vec<&Step>> {
        let producers: HashMap<&str, usize> = self
            .steps
            .iter()
            .enumerate()
            .filter_map(|(i, step)| match step {
                Step::Deploy(deploy) => Some((deploy.name.as_str(), i)),
                Step::Call(_) => None,
            })
            .collect();

        let mut indegree = vec![0usize; self.steps.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.steps.len()];

        for (i, step) in self.steps.iter().enumerate() {
            for input in step.inputs() {
                match producers.get(input.as_str()) {
                    Some(&producer) => {
                        indegree[i] += 1;
                        dependents[producer].push(i);
                    }
                    None if recorded.contains_key(&input) => {}
                    None => {
                        return Err(Error::UnresolvedReference {
                            step: step.label(),
                            reference: input,
                        })
                    }
                }
            }
        }

        let mut ready: BTreeSet<usize> = (0..self.steps.len())
            .filter(|&i| indegree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.steps.len());

        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &dependent in &dependents[i] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < self.steps.len() {
            let stuck: Vec<String> = (0..self.steps.len())
                .filter(|&i| indegree[i] > 0)
                .map(|i| self.steps[i].label())
                .collect();
            return Err(Error::InvalidPlan(format!(
                "dependency cycle between: {}",
                stuck.join(", ")
            )));
        }

        Ok(order.into_iter().map(|i| &self.steps[i]).collect())
    }
}

/// The name inside an exact `${Name}` string, if any
pub fn reference(s: &str) -> Option<&str> {
    s.strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|name| !name.is_empty() && !name.contains(['{', '}', '$']))
}

fn collect_references(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            if let Some(name) = reference(s) {
                out.insert(name.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_references(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_references(v, out)),
        _ => {}
    }
}

/// Replace every `${Name}` in `args` with the checksummed address of `Name`
pub fn substitute_references(
    step: &str,
    args: &[Value],
    addresses: &BTreeMap<String, Address>,
) -> Result<Vec<Value>> {
    args.iter()
        .map(|arg| substitute(step, arg, addresses))
        .collect()
}

fn substitute(step: &str, value: &Value, addresses: &BTreeMap<String, Address>) -> Result<Value> {
    match value {
        Value::String(s) => match reference(s) {
            Some(name) => addresses
                .get(name)
                .map(|address| Value::String(address.to_checksum(None)))
                .ok_or_else(|| Error::UnresolvedReference {
                    step: step.to_string(),
                    reference: name.to_string(),
                }),
            None => Ok(value.clone()),
        },
        Value::Array(items) => items
            .iter()
            .map(|v| substitute(step, v, addresses))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| substitute(step, v, addresses).map(|v| (k.clone(), v)))
            .collect::<Result<serde_json::Map<_, _>>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}
