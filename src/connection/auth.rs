// Copyright Rouven Bauer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Credentials attached to every request that does not already carry an
/// `Authorization` header of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// No credentials (server with authentication disabled).
    None,
    /// HTTP basic authentication.
    Basic { username: String, password: String },
    /// JWT bearer token, e.g. obtained from `/_open/auth`.
    Jwt { token: String },
}

impl Auth {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn jwt(token: impl Into<String>) -> Self {
        Self::Jwt {
            token: token.into(),
        }
    }

    /// Render the `Authorization` header value, if any.
    pub(crate) fn header_value(&self) -> Option<String> {
        match self {
            Auth::None => None,
            Auth::Basic { username, password } => {
                let credentials = STANDARD.encode(format!("{}:{}", username, password));
                Some(format!("Basic {}", credentials))
            }
            Auth::Jwt { token } => Some(format!("Bearer {}", token)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_encodes_credentials() {
        let auth = Auth::basic("root", "passwd");
        // base64("root:passwd")
        assert_eq!(auth.header_value().unwrap(), "Basic cm9vdDpwYXNzd2Q=");
    }

    #[test]
    fn jwt_renders_bearer() {
        let auth = Auth::jwt("abc.def.ghi");
        assert_eq!(auth.header_value().unwrap(), "Bearer abc.def.ghi");
    }

    #[test]
    fn no_auth_renders_nothing() {
        assert_eq!(Auth::None.header_value(), None);
    }
}
