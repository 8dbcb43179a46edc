// Signature coordination. Signing is strictly sequential: the engineer
// signs first (DRAFT or PENDING_SIGNATURE -> SIGNED), then the company
// or an admin countersigns (SIGNED -> ACTIVE). A contract is ACTIVE
// only when both signatures are present.

use chrono::Utc;
use tracing::{info, Instrument};

use crate::auth::{authorize_party, Operation, RequiredParty};
use crate::domain::{Actor, ActorRole, Contract, ContractId, ContractStatus, Signature};
use crate::error::{EngineError, EntityKind};
use crate::notify::LifecycleEvent;
use crate::store::ContractStore;

use super::{lifecycle_span, ContractEngine};

impl<S: ContractStore> ContractEngine<S> {
    pub async fn sign_contract(
        &self,
        contract_id: ContractId,
        actor: &Actor,
        signature_name: &str,
    ) -> Result<Contract, EngineError> {
        let span = lifecycle_span(Operation::SignContract, Some(contract_id), Some(actor));
        async {
            let lock = self.contract_lock(contract_id).await;
            let _guard = lock.lock().await;

            let mut contract = self.load_required(contract_id).await?;

            match contract.status {
                ContractStatus::Draft | ContractStatus::PendingSignature => {
                    // The engineer's turn. A company signature here
                    // would be out of order, not merely early.
                    authorize_party(
                        RequiredParty::Engineer,
                        Operation::SignContract,
                        actor,
                        &contract,
                    )?;
                    debug_assert!(contract.engineer_signature.is_none());
                    contract.engineer_signature = Some(Signature {
                        name: signature_name.to_string(),
                        signed_at: Utc::now(),
                    });
                    contract.status = ContractStatus::Signed;
                }
                ContractStatus::Signed => {
                    if actor.role == ActorRole::Engineer {
                        // Engineer already signed; re-signing is not a
                        // role problem but an illegal transition.
                        return Err(EngineError::invalid_transition(
                            EntityKind::Contract,
                            contract.status,
                            Operation::SignContract,
                        ));
                    }
                    authorize_party(
                        RequiredParty::Company,
                        Operation::SignContract,
                        actor,
                        &contract,
                    )?;
                    contract.company_signature = Some(Signature {
                        name: signature_name.to_string(),
                        signed_at: Utc::now(),
                    });
                    contract.status = ContractStatus::Active;
                }
                ContractStatus::Active | ContractStatus::Completed => {
                    return Err(EngineError::invalid_transition(
                        EntityKind::Contract,
                        contract.status,
                        Operation::SignContract,
                    ));
                }
            }

            contract.touch();
            self.store().save_contract(&contract).await?;
            info!(
                contract.id = %contract.id,
                signer = %actor.role,
                status = %contract.status,
                "contract signed"
            );
            self.notify(LifecycleEvent::ContractSigned {
                contract_id,
                signer: actor.role,
                status: contract.status,
            })
            .await;
            Ok(contract)
        }
        .instrument(span)
        .await
    }
}
