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

//! Masking of credential secrets in diagnostic text.
//!
//! # Security Considerations
//! - Never log a command that may contain a secret without masking it first
//! - Mask the exact form that was substituted into the command (after quoting)

use zeroize::Zeroizing;

/// Placeholder written in place of a secret in any surfaced text.
pub const SECRET_MASK: &str = "XXXXX";

/// Replace every occurrence of `secret` in `text` with [`SECRET_MASK`].
///
/// An empty secret leaves the text untouched.
pub fn mask_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, SECRET_MASK)
}

/// Quote `value` for use inside a single-quoted POSIX shell string.
///
/// Each `'` becomes `'\''`. The surrounding quotes are not added.
/// The result holds secret material, so it is returned in zeroizing storage.
pub fn escape_single_quoted(value: &str) -> Zeroizing<String> {
    Zeroizing::new(value.replace('\'', r"'\''"))
}
