// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Rendered bootstrap scripts.
//!
//! Turning a platform-independent script description into shell text is the
//! job of a [`RenderScript`] implementation supplied by the caller. The engine
//! only ever sees the rendered [`ScriptSpec`].

use std::fmt;

use crate::error::ValidationError;
use crate::security::validate_script_name;

/// Operating system family a script is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Unix,
    Windows,
}

/// Converts a script description into literal shell text.
///
/// Implementations must be deterministic and free of side effects.
pub trait RenderScript {
    fn render(&self, family: OsFamily) -> String;
}

/// Already-rendered text renders to itself.
impl RenderScript for str {
    fn render(&self, _family: OsFamily) -> String {
        self.to_string()
    }
}

impl RenderScript for String {
    fn render(&self, _family: OsFamily) -> String {
        self.clone()
    }
}

/// A named, rendered script ready for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct ScriptSpec {
    name: String,
    body: String,
}

impl ScriptSpec {
    /// Create a script spec from a name and rendered body.
    ///
    /// The name becomes the remote filename and must be a single safe path
    /// segment.
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_script_name(&name)?;
        Ok(Self {
            name,
            body: body.into(),
        })
    }

    /// Render `script` for the Unix family and wrap it as a spec.
    ///
    /// The phase commands (`chmod 755`, `./<name>`) are POSIX, so rendering
    /// always targets [`OsFamily::Unix`].
    pub fn render<R: RenderScript + ?Sized>(
        name: impl Into<String>,
        script: &R,
    ) -> Result<Self, ValidationError> {
        Self::new(name, script.render(OsFamily::Unix))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Debug for ScriptSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptSpec")
            .field("name", &self.name)
            .field("body_len", &self.body.len())
            .finish()
    }
}
