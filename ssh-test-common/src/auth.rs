use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use ssh_client_lowlevel::{
    AuthCode, AuthTransport, Prompt, TransportError, TransportErrorKind,
};

/// What the scripted server accepts.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    accept_none: bool,
    passwords: Vec<String>,
    keys: Vec<String>,
    kbdint_rounds: Vec<(Prompt, Vec<String>)>,
    required_factors: usize,
    success_before_authenticated: bool,
    again: HashMap<&'static str, u32>,
    failing: Vec<&'static str>,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            accept_none: false,
            passwords: Vec::new(),
            keys: Vec::new(),
            kbdint_rounds: Vec::new(),
            required_factors: 1,
            success_before_authenticated: false,
            again: HashMap::new(),
            failing: Vec::new(),
        }
    }
}

impl AuthPolicy {
    /// Let the `none` method in.
    pub fn accept_none(mut self) -> Self {
        self.accept_none = true;
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.passwords.push(password.to_owned());
        self
    }

    /// Authorize the key with the given name.
    pub fn key(mut self, name: &str) -> Self {
        self.keys.push(name.to_owned());
        self
    }

    /// Add a keyboard-interactive round expecting exactly `answers`.
    pub fn kbdint_round(mut self, prompt: Prompt, answers: &[&str]) -> Self {
        let answers = answers.iter().map(|answer| (*answer).to_owned()).collect();
        self.kbdint_rounds.push((prompt, answers));
        self
    }

    /// Number of successful methods needed before the session is
    /// authenticated.
    pub fn required_factors(mut self, factors: usize) -> Self {
        self.required_factors = factors.max(1);
        self
    }

    /// Report `Success` instead of `Partial` for factors that do not yet
    /// authenticate the session.
    pub fn success_before_authenticated(mut self) -> Self {
        self.success_before_authenticated = true;
        self
    }

    /// Answer the first `times` requests of `method` with `Again`.
    pub fn again(mut self, method: &'static str, times: u32) -> Self {
        self.again.insert(method, times);
        self
    }

    /// Fail every request of `method` with a lost connection.
    pub fn failing(mut self, method: &'static str) -> Self {
        self.failing.push(method);
        self
    }
}

#[derive(Debug)]
struct Exchange {
    round: usize,
    answers: Vec<String>,
}

#[derive(Debug)]
struct State {
    policy: AuthPolicy,
    calls: Vec<&'static str>,
    satisfied: Vec<&'static str>,
    authenticated: bool,
    exchange: Option<Exchange>,
    prompts_sent: usize,
}

impl State {
    fn request(&mut self, call: &'static str, method: &'static str) -> Result<bool, TransportError> {
        self.calls.push(call);

        if self.policy.failing.contains(&method) {
            return Err(TransportError::new(
                TransportErrorKind::ConnectionLost,
                "connection reset by peer",
            ));
        }

        match self.policy.again.get_mut(method) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn grant(&mut self, method: &'static str) -> AuthCode {
        self.satisfied.push(method);

        if self.satisfied.len() >= self.policy.required_factors {
            self.authenticated = true;
            AuthCode::Success
        } else if self.policy.success_before_authenticated {
            AuthCode::Success
        } else {
            AuthCode::Partial
        }
    }

    fn new_exchange(&mut self, round: usize) -> AuthCode {
        let questions = self.policy.kbdint_rounds[round].0.questions.len();
        self.exchange = Some(Exchange {
            round,
            answers: vec![String::new(); questions],
        });
        AuthCode::Info
    }
}

/// Transient key handle handed out by [`MockAuth`].
///
/// Every live key is counted, see [`MockAuth::live_keys`].
#[derive(Debug)]
pub struct MockKey {
    name: String,
    private: bool,
    live: Arc<AtomicUsize>,
}

impl MockKey {
    fn new(name: String, private: bool, live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self {
            name,
            private,
            live: Arc::clone(live),
        }
    }
}

impl Drop for MockKey {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Scripted ssh server side of user authentication.
///
/// Clones share the same state, so a test can keep one to inspect what the
/// negotiator did.
#[derive(Debug, Clone)]
pub struct MockAuth {
    state: Arc<Mutex<State>>,
    live_keys: Arc<AtomicUsize>,
}

impl MockAuth {
    pub fn new(policy: AuthPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                policy,
                calls: Vec::new(),
                satisfied: Vec::new(),
                authenticated: false,
                exchange: None,
                prompts_sent: 0,
            })),
            live_keys: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Every call issued so far, in order, key imports included.
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    /// Calls that reached the server as authentication requests.
    pub fn auth_requests(&self) -> Vec<&'static str> {
        self.lock()
            .calls
            .iter()
            .copied()
            .filter(|call| !call.starts_with("import_"))
            .collect()
    }

    /// Methods that were accepted, in order.
    pub fn satisfied(&self) -> Vec<&'static str> {
        self.lock().satisfied.clone()
    }

    /// Number of key handles not yet dropped.
    pub fn live_keys(&self) -> usize {
        self.live_keys.load(Ordering::SeqCst)
    }

    /// Number of keyboard-interactive challenges fetched.
    pub fn prompts_sent(&self) -> usize {
        self.lock().prompts_sent
    }

    fn parse_key(material: &str) -> Result<(String, Option<String>), TransportError> {
        let malformed = || {
            TransportError::new(TransportErrorKind::Failure, "malformed key material")
        };

        if let Some(name) = material.strip_prefix("mock-key:") {
            if name.is_empty() {
                return Err(malformed());
            }
            Ok((name.to_owned(), None))
        } else if let Some(rest) = material.strip_prefix("mock-key-enc:") {
            let (name, passphrase) = rest.split_once(':').ok_or_else(malformed)?;
            Ok((name.to_owned(), Some(passphrase.to_owned())))
        } else {
            Err(malformed())
        }
    }
}

impl AuthTransport for MockAuth {
    type Key = MockKey;

    fn userauth_none(&mut self) -> Result<AuthCode, TransportError> {
        let mut state = self.lock();
        if state.request("none", "none")? {
            return Ok(AuthCode::Again);
        }

        if state.policy.accept_none {
            Ok(state.grant("none"))
        } else {
            Ok(AuthCode::Denied)
        }
    }

    fn userauth_password(&mut self, password: &str) -> Result<AuthCode, TransportError> {
        let mut state = self.lock();
        if state.request("password", "password")? {
            return Ok(AuthCode::Again);
        }

        if state.policy.passwords.iter().any(|accepted| accepted == password) {
            Ok(state.grant("password"))
        } else {
            Ok(AuthCode::Denied)
        }
    }

    fn userauth_kbdint(&mut self) -> Result<AuthCode, TransportError> {
        let mut state = self.lock();
        if state.request("keyboard-interactive", "keyboard-interactive")? {
            return Ok(AuthCode::Again);
        }

        if state.policy.kbdint_rounds.is_empty() {
            return Ok(AuthCode::Denied);
        }

        match state.exchange.take() {
            None => Ok(state.new_exchange(0)),
            Some(exchange) => {
                let rounds = &state.policy.kbdint_rounds;
                if exchange.answers != rounds[exchange.round].1 {
                    Ok(AuthCode::Denied)
                } else if exchange.round + 1 == rounds.len() {
                    Ok(state.grant("keyboard-interactive"))
                } else {
                    Ok(state.new_exchange(exchange.round + 1))
                }
            }
        }
    }

    fn kbdint_prompt(&mut self) -> Result<Prompt, TransportError> {
        let mut state = self.lock();
        let round = match &state.exchange {
            Some(exchange) => exchange.round,
            None => return Err(TransportError::other("no pending challenge")),
        };
        state.prompts_sent += 1;
        Ok(state.policy.kbdint_rounds[round].0.clone())
    }

    fn kbdint_set_answer(&mut self, index: usize, answer: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        let slot = state
            .exchange
            .as_mut()
            .and_then(|exchange| exchange.answers.get_mut(index))
            .ok_or_else(|| TransportError::other("answer index out of range"))?;
        *slot = answer.to_owned();
        Ok(())
    }

    fn import_public_key(&mut self, material: &str) -> Result<MockKey, TransportError> {
        self.lock().calls.push("import_public_key");

        let (name, _passphrase) = Self::parse_key(material)?;
        Ok(MockKey::new(name, false, &self.live_keys))
    }

    fn import_private_key(
        &mut self,
        material: &str,
        passphrase: Option<&str>,
    ) -> Result<MockKey, TransportError> {
        self.lock().calls.push("import_private_key");

        let (name, expected) = Self::parse_key(material)?;
        if expected.is_some() && expected.as_deref() != passphrase {
            return Err(TransportError::new(
                TransportErrorKind::Failure,
                "wrong passphrase",
            ));
        }
        Ok(MockKey::new(name, true, &self.live_keys))
    }

    fn userauth_try_publickey(&mut self, key: &MockKey) -> Result<AuthCode, TransportError> {
        let mut state = self.lock();
        if state.request("try_publickey", "publickey")? {
            return Ok(AuthCode::Again);
        }

        if state.policy.keys.contains(&key.name) {
            Ok(AuthCode::Success)
        } else {
            Ok(AuthCode::Denied)
        }
    }

    fn userauth_publickey(&mut self, key: &MockKey) -> Result<AuthCode, TransportError> {
        let mut state = self.lock();
        if state.request("publickey", "publickey")? {
            return Ok(AuthCode::Again);
        }

        if !key.private {
            return Err(TransportError::other("cannot sign with a public key"));
        }

        if state.policy.keys.contains(&key.name) {
            Ok(state.grant("publickey"))
        } else {
            Ok(AuthCode::Denied)
        }
    }

    fn is_authenticated(&self) -> bool {
        self.lock().authenticated
    }
}
