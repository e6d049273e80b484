//! Resource paths under the API namespace.
//!
//! Paths are relative to the API base URL (`.../api/v1`) and follow the
//! entity tree: `centers/{center}/extensions/{extension}/products/{product}/builds/{build}`.

use std::fmt;
use std::str::FromStr;

use srs_core::error::CoreError;

pub const LOGIN: &str = "login";
pub const USER: &str = "user";
pub const CENTERS: &str = "centers";

/// Build log of an execution, relative to its output directory.
pub const OUTPUT_LOG: &str = "target/maven.log";

pub fn center(center: &str) -> String {
    format!("{CENTERS}/{center}")
}

pub fn extensions(center_id: &str) -> String {
    format!("{}/extensions", center(center_id))
}

pub fn extension(center_id: &str, extension: &str) -> String {
    format!("{}/{extension}", extensions(center_id))
}

pub fn products(center_id: &str, extension_id: &str) -> String {
    format!("{}/products", extension(center_id, extension_id))
}

pub fn product(center_id: &str, extension_id: &str, product: &str) -> String {
    format!("{}/{product}", products(center_id, extension_id))
}

pub fn builds(center_id: &str, extension_id: &str, product_id: &str) -> String {
    format!("{}/builds", product(center_id, extension_id, product_id))
}

/// Address of one build in the entity tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPath {
    pub center: String,
    pub extension: String,
    pub product: String,
    pub build: String,
}

impl BuildPath {
    pub fn new(
        center: impl Into<String>,
        extension: impl Into<String>,
        product: impl Into<String>,
        build: impl Into<String>,
    ) -> Self {
        Self {
            center: center.into(),
            extension: extension.into(),
            product: product.into(),
            build: build.into(),
        }
    }

    /// Collection path of all builds of this build's product.
    pub fn builds(&self) -> String {
        builds(&self.center, &self.extension, &self.product)
    }

    pub fn path(&self) -> String {
        format!("{}/{}", self.builds(), self.build)
    }

    pub fn config(&self) -> String {
        format!("{}/config", self.path())
    }

    pub fn packages(&self) -> String {
        format!("{}/packages", self.path())
    }

    pub fn package(&self, package: &str) -> String {
        format!("{}/{package}", self.packages())
    }

    pub fn input_files(&self, package: &str) -> String {
        format!("{}/inputfiles", self.package(package))
    }

    pub fn manifest(&self, package: &str) -> String {
        format!("{}/manifest", self.package(package))
    }

    pub fn input_file(&self, package: &str, filename: &str) -> String {
        format!("{}/{filename}", self.input_files(package))
    }

    pub fn executions(&self) -> String {
        format!("{}/executions", self.path())
    }

    pub fn execution(&self, execution: impl Into<String>) -> ExecutionPath {
        ExecutionPath {
            build: self.clone(),
            execution: execution.into(),
        }
    }
}

/// Address of one execution in the entity tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPath {
    pub build: BuildPath,
    pub execution: String,
}

impl ExecutionPath {
    pub fn path(&self) -> String {
        format!("{}/{}", self.build.executions(), self.execution)
    }

    pub fn configuration(&self) -> String {
        format!("{}/configuration", self.path())
    }

    pub fn trigger(&self) -> String {
        format!("{}/trigger", self.path())
    }

    /// A file under the execution's output directory.
    pub fn output(&self, file: &str) -> String {
        format!("{}/output/{}", self.path(), file.trim_start_matches('/'))
    }
}

impl fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.build.center, self.build.extension, self.build.product, self.build.build, self.execution
        )
    }
}

/// Parses `center/extension/product/build/execution`.
impl FromStr for ExecutionPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim_matches('/').split('/').collect();
        match parts.as_slice() {
            [center, extension, product, build, execution]
                if parts.iter().all(|part| !part.is_empty()) =>
            {
                Ok(BuildPath::new(*center, *extension, *product, *build).execution(*execution))
            }
            _ => Err(CoreError::Validation(format!(
                "execution path must be center/extension/product/build/execution, got `{s}`"
            ))),
        }
    }
}
