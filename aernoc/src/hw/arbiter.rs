// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::Error;

/// Single reservation slot guarding the TCAM of a router.
///
/// While reserved, `grant()` names the input port whose event is being looked
/// up.
#[derive(Clone, Debug, Default)]
pub struct Arbiter {
    granted_input: Option<usize>,
}

impl Arbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.granted_input.is_none()
    }

    pub fn reserve(&mut self, port: usize) -> Result<(), Error> {
        if let Some(granted) = self.granted_input {
            return Err(Error::ArbiterReserved(granted));
        }
        self.granted_input = Some(port);
        Ok(())
    }

    pub fn release(&mut self) -> Result<(), Error> {
        match self.granted_input.take() {
            Some(_) => Ok(()),
            None => Err(Error::ArbiterNotReserved),
        }
    }

    /// release regardless of the current state; used by reset.
    pub fn force_release(&mut self) {
        self.granted_input = None;
    }

    pub fn grant(&self) -> Option<usize> {
        self.granted_input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_release() {
        let mut arbiter = Arbiter::new();
        assert!(arbiter.is_available());
        assert_eq!(arbiter.grant(), None);
        arbiter.reserve(3).unwrap();
        assert!(!arbiter.is_available());
        assert_eq!(arbiter.grant(), Some(3));
        arbiter.release().unwrap();
        assert!(arbiter.is_available());
    }

    #[test]
    fn exclusive_reservation() {
        let mut arbiter = Arbiter::new();
        arbiter.reserve(1).unwrap();
        assert_eq!(arbiter.reserve(2), Err(Error::ArbiterReserved(1)));
        // the failed attempt does not steal the grant
        assert_eq!(arbiter.grant(), Some(1));
        arbiter.release().unwrap();
        arbiter.reserve(2).unwrap();
        assert_eq!(arbiter.grant(), Some(2));
    }

    #[test]
    fn release_while_free_is_rejected() {
        let mut arbiter = Arbiter::new();
        assert_eq!(arbiter.release(), Err(Error::ArbiterNotReserved));
        arbiter.reserve(0).unwrap();
        arbiter.force_release();
        assert_eq!(arbiter.release(), Err(Error::ArbiterNotReserved));
    }
}
