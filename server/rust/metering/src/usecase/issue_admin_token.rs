use std::sync::Arc;

use planforge_admin_token::{IssuedToken, TokenSigner};
use thiserror::Error;

/// 管理者ログインの入力。
#[derive(Debug, Clone)]
pub struct IssueAdminTokenInput {
    pub password: String,
}

#[derive(Debug, Error)]
pub enum IssueAdminTokenError {
    #[error("invalid admin credentials")]
    InvalidCredentials,
}

/// 共有シークレットを照合し、短命の署名付きトークンを発行するユースケース。
pub struct IssueAdminTokenUseCase {
    signer: Arc<TokenSigner>,
}

impl IssueAdminTokenUseCase {
    pub fn new(signer: Arc<TokenSigner>) -> Self {
        Self { signer }
    }

    pub fn execute(&self, input: IssueAdminTokenInput) -> Result<IssuedToken, IssueAdminTokenError> {
        if !self.signer.secret_matches(&input.password) {
            return Err(IssueAdminTokenError::InvalidCredentials);
        }
        Ok(self.signer.issue())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> Arc<TokenSigner> {
        Arc::new(TokenSigner::new("correct-horse".to_string(), 900).unwrap())
    }

    #[test]
    fn test_execute_issues_verifiable_token() {
        let signer = signer();
        let usecase = IssueAdminTokenUseCase::new(signer.clone());

        let issued = usecase
            .execute(IssueAdminTokenInput {
                password: "correct-horse".to_string(),
            })
            .unwrap();

        assert!(signer.verify(&issued.token));
    }

    #[test]
    fn test_execute_rejects_wrong_password() {
        let usecase = IssueAdminTokenUseCase::new(signer());
        let result = usecase.execute(IssueAdminTokenInput {
            password: "battery-staple".to_string(),
        });
        assert!(matches!(result, Err(IssueAdminTokenError::InvalidCredentials)));
    }

    #[test]
    fn test_execute_rejects_empty_password() {
        let usecase = IssueAdminTokenUseCase::new(signer());
        let result = usecase.execute(IssueAdminTokenInput {
            password: String::new(),
        });
        assert!(matches!(result, Err(IssueAdminTokenError::InvalidCredentials)));
    }
}
