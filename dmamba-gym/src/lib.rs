pub mod d4rl;

use candle_core::{Error, Result};
use dmamba_core::env::{Env, EnvironmentDescription, SnapShot, Space};
use pyo3::{
    Bound, PyAny, PyObject, PyResult, Python,
    exceptions::PyTypeError,
    types::{PyAnyMethods, PyDict, PyTuple},
};

/// Which Python package the environment comes from. D4RL datasets only register with the legacy
/// `gym` package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GymBackend {
    Gym,
    Gymnasium,
}

impl GymBackend {
    pub fn module(&self) -> &'static str {
        match self {
            Self::Gym => "gym",
            Self::Gymnasium => "gymnasium",
        }
    }
}

pub struct GymEnv {
    env: PyObject,
    action_space: Space,
    observation_space: Space,
}

pub(crate) fn extract_space(space: &Bound<'_, PyAny>, spaces_module: &str) -> PyResult<Space> {
    let py = space.py();
    let gym_spaces = py.import(spaces_module)?;
    if space.is_instance(&gym_spaces.getattr("Discrete")?)? {
        Ok(Space::Discrete(space.getattr("n")?.extract()?))
    } else {
        let low: Vec<f32> = space.getattr("low")?.call_method0("flatten")?.extract()?;
        let high: Vec<f32> = space.getattr("high")?.call_method0("flatten")?.extract()?;
        let size = low.len();
        Ok(Space::Continous {
            min: Some(low),
            max: Some(high),
            size,
        })
    }
}

impl GymEnv {
    /// Builds the environment, importing `preload` first so third party registrations (such as
    /// `d4rl`) are visible to `make`.
    pub fn new(name: &str, backend: GymBackend, preload: &[&str]) -> Result<GymEnv> {
        Python::with_gil(|py| {
            for module in preload {
                py.import(*module)?;
            }
            let gym = py.import(backend.module())?;
            let env = gym.getattr("make")?.call1((name,))?;
            let spaces_module = format!("{}.spaces", backend.module());
            let action_space = extract_space(&env.getattr("action_space")?, &spaces_module)?;
            let observation_space = env.getattr("observation_space")?;
            let observation_space: Vec<usize> = observation_space.getattr("shape")?.extract()?;
            let observation_space = Space::continous_from_dims(observation_space);
            PyResult::Ok(GymEnv {
                env: env.into(),
                action_space,
                observation_space,
            })
        })
        .map_err(Error::wrap)
    }

    pub fn observation_size(&self) -> usize {
        self.observation_space.size()
    }

    pub fn action_size(&self) -> usize {
        self.action_space.size()
    }
}

impl Env for GymEnv {
    fn reset(&mut self, seed: u64) -> Result<Vec<f32>> {
        Python::with_gil(|py| {
            let kwargs = PyDict::new(py);
            kwargs.set_item("seed", seed)?;
            let state = match self.env.call_method(py, "reset", (), Some(&kwargs)) {
                Ok(state) => state,
                // legacy gym: no seed keyword on reset
                Err(err) if err.is_instance_of::<PyTypeError>(py) => {
                    self.env.call_method1(py, "seed", (seed,))?;
                    self.env.call_method0(py, "reset")?
                }
                Err(err) => return Err(err),
            };
            let state = state.bind(py);
            let state = if state.is_instance_of::<PyTuple>() {
                state.get_item(0)?
            } else {
                state.clone()
            };
            state.call_method0("flatten")?.call_method0("tolist")?.extract()
        })
        .map_err(Error::wrap)
    }

    fn step(&mut self, action: &[f32]) -> Result<SnapShot> {
        Python::with_gil(|py| {
            let numpy = py.import("numpy")?;
            let action = numpy.getattr("asarray")?.call1((action.to_vec(), "float32"))?;
            let step = self.env.call_method1(py, "step", (action,))?;
            let step = step.bind(py);
            let state: Vec<f32> = step
                .get_item(0)?
                .call_method0("flatten")?
                .call_method0("tolist")?
                .extract()?;
            let reward: f32 = step.get_item(1)?.extract()?;
            let (terminated, trancuated) = if step.len()? == 5 {
                (step.get_item(2)?.extract()?, step.get_item(3)?.extract()?)
            } else {
                (step.get_item(2)?.extract()?, false)
            };
            PyResult::Ok(SnapShot {
                state,
                reward,
                terminated,
                trancuated,
            })
        })
        .map_err(Error::wrap)
    }

    fn env_description(&self) -> EnvironmentDescription {
        EnvironmentDescription {
            observation_space: self.observation_space.clone(),
            action_space: self.action_space.clone(),
        }
    }
}
