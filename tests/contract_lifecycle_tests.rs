//! Contract creation and milestone state machine tests
//!
//! Covers the creation invariants (directory references, milestone sum,
//! positive amounts), the fund -> submit -> approve path, forward-only
//! ordering, idempotent re-application, and role checks.

mod common;

use common::TestWorld;
use milemark::{
    ActorRole, ContractStatus, EngineError, MilestoneStatus, PaymentTerms,
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn milestone_sum_must_match_agreed_total() {
    let world = TestWorld::new();
    let mut draft = world.milestone_draft("GBP", &[dec!(1000), dec!(2000)]);
    if let milemark::EngagementDraft::MilestoneBased { agreed_total, .. } = &mut draft.engagement {
        *agreed_total = dec!(2999);
    }
    let err = world
        .engine
        .create_contract(draft, &world.company_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvariantViolation { .. }));
}

#[tokio::test]
async fn milestone_amounts_must_be_positive() {
    let world = TestWorld::new();
    let draft = world.milestone_draft("GBP", &[dec!(1000), dec!(0)]);
    let err = world
        .engine
        .create_contract(draft, &world.company_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvariantViolation { .. }));
}

#[tokio::test]
async fn unknown_directory_references_are_rejected() {
    let world = TestWorld::new();
    let mut draft = world.milestone_draft("GBP", &[dec!(1000)]);
    draft.engineer_id = milemark::EngineerId::new();
    let err = world
        .engine
        .create_contract(draft, &world.admin_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[tokio::test]
async fn engineer_cannot_create_a_contract() {
    let world = TestWorld::new();
    let draft = world.milestone_draft("GBP", &[dec!(1000)]);
    let err = world
        .engine
        .create_contract(draft, &world.engineer_actor())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Unauthorized {
            role: ActorRole::Engineer,
            ..
        }
    ));
}

#[tokio::test]
async fn full_milestone_path_advances_in_order() {
    let world = TestWorld::new();
    let contract = world
        .active_milestone_contract("GBP", &[dec!(1000), dec!(1500)])
        .await;
    let m1 = contract.milestones().unwrap()[0].id;

    let funded = world
        .engine
        .fund_milestone(contract.id, m1, &world.company_actor())
        .await
        .unwrap();
    assert_eq!(funded.status, MilestoneStatus::FundedInProgress);

    let submitted = world
        .engine
        .submit_milestone_for_approval(contract.id, m1, &world.engineer_actor())
        .await
        .unwrap();
    assert_eq!(submitted.status, MilestoneStatus::SubmittedForApproval);

    let approved = world
        .engine
        .approve_milestone(contract.id, m1, &world.company_actor())
        .await
        .unwrap();
    assert_eq!(approved.status, MilestoneStatus::ApprovedPendingInvoice);

    // The sibling milestone never moved.
    let contract = world.engine.contract(contract.id).await.unwrap();
    assert_eq!(
        contract.milestones().unwrap()[1].status,
        MilestoneStatus::Pending
    );
}

#[tokio::test]
async fn funding_requires_an_active_contract() {
    let world = TestWorld::new();
    let contract = world
        .engine
        .create_contract(
            world.milestone_draft("GBP", &[dec!(1000)]),
            &world.company_actor(),
        )
        .await
        .unwrap();
    let m1 = contract.milestones().unwrap()[0].id;

    let err = world
        .engine
        .fund_milestone(contract.id, m1, &world.company_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[tokio::test]
async fn approving_a_pending_milestone_is_rejected_and_unchanged() {
    let world = TestWorld::new();
    let contract = world.active_milestone_contract("GBP", &[dec!(1000)]).await;
    let m1 = contract.milestones().unwrap()[0].id;

    let err = world
        .engine
        .approve_milestone(contract.id, m1, &world.company_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    let contract = world.engine.contract(contract.id).await.unwrap();
    assert_eq!(
        contract.milestones().unwrap()[0].status,
        MilestoneStatus::Pending
    );
}

#[tokio::test]
async fn refunding_a_funded_milestone_is_an_idempotent_no_op() {
    let world = TestWorld::new();
    let contract = world.active_milestone_contract("GBP", &[dec!(1000)]).await;
    let m1 = contract.milestones().unwrap()[0].id;

    world
        .engine
        .fund_milestone(contract.id, m1, &world.company_actor())
        .await
        .unwrap();
    let again = world
        .engine
        .fund_milestone(contract.id, m1, &world.company_actor())
        .await
        .unwrap();
    assert_eq!(again.status, MilestoneStatus::FundedInProgress);
}

#[tokio::test]
async fn only_the_contract_engineer_may_submit() {
    let world = TestWorld::new();
    let contract = world.active_milestone_contract("GBP", &[dec!(1000)]).await;
    let m1 = contract.milestones().unwrap()[0].id;
    world
        .engine
        .fund_milestone(contract.id, m1, &world.company_actor())
        .await
        .unwrap();

    let stranger = milemark::Actor::engineer(uuid::Uuid::new_v4());
    let err = world
        .engine
        .submit_milestone_for_approval(contract.id, m1, &stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized { .. }));

    let err = world
        .engine
        .submit_milestone_for_approval(contract.id, m1, &world.company_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized { .. }));
}

#[tokio::test]
async fn milestone_operations_do_not_apply_to_day_rate_contracts() {
    let world = TestWorld::new();
    let contract = world.active_day_rate_contract("EUR", dec!(600)).await;
    let err = world
        .engine
        .fund_milestone(contract.id, milemark::MilestoneId::new(), &world.company_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[tokio::test]
async fn contract_completes_only_when_every_milestone_is_paid() {
    let world = TestWorld::new();
    let contract = world.active_milestone_contract("GBP", &[dec!(1000)]).await;
    let m1 = contract.milestones().unwrap()[0].id;

    let err = world
        .engine
        .complete_contract(contract.id, &world.company_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));

    world
        .engine
        .fund_milestone(contract.id, m1, &world.company_actor())
        .await
        .unwrap();
    world
        .engine
        .submit_milestone_for_approval(contract.id, m1, &world.engineer_actor())
        .await
        .unwrap();
    world
        .engine
        .approve_milestone(contract.id, m1, &world.company_actor())
        .await
        .unwrap();
    world
        .engine
        .generate_invoice(contract.id, PaymentTerms::Net14, &world.company_actor())
        .await
        .unwrap();

    let contract = world
        .engine
        .complete_contract(contract.id, &world.company_actor())
        .await
        .unwrap();
    assert_eq!(contract.status, ContractStatus::Completed);
}

#[tokio::test]
async fn operations_on_distinct_contracts_proceed_in_parallel() {
    let world = std::sync::Arc::new(TestWorld::new());
    let a = world.active_milestone_contract("GBP", &[dec!(100)]).await;
    let b = world.active_milestone_contract("GBP", &[dec!(200)]).await;
    let ma = a.milestones().unwrap()[0].id;
    let mb = b.milestones().unwrap()[0].id;

    let wa = world.clone();
    let wb = world.clone();
    let (ra, rb) = tokio::join!(
        async move { wa.engine.fund_milestone(a.id, ma, &wa.company_actor()).await },
        async move { wb.engine.fund_milestone(b.id, mb, &wb.company_actor()).await },
    );
    assert_eq!(ra.unwrap().status, MilestoneStatus::FundedInProgress);
    assert_eq!(rb.unwrap().status, MilestoneStatus::FundedInProgress);
}
