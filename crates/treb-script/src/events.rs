//! The wire contract with the deployment-script library: the domain events hydration decodes
//! against, plus the three proxy primitives.

use alloy_sol_types::sol;

sol! {
    pub struct DeploymentInfo {
        string artifact;
        string label;
        string entropy;
        bytes32 salt;
        bytes32 bytecodeHash;
        bytes32 initCodeHash;
        bytes constructorArgs;
        string createStrategy;
    }

    pub event ContractDeployed(
        address indexed deployer,
        address indexed location,
        bytes32 indexed transactionId,
        DeploymentInfo deployment
    );

    pub event DeploymentCollision(address indexed existingContract, DeploymentInfo deployment);

    pub struct TxCall {
        address to;
        bytes data;
        uint256 value;
    }

    pub struct SimulatedTx {
        bytes32 transactionId;
        bytes32 senderId;
        address sender;
        bytes returnData;
        TxCall transaction;
    }

    pub event TransactionSimulated(SimulatedTx info);

    pub event SafeTransactionQueued(
        bytes32 indexed safeTxHash,
        address indexed safe,
        address indexed proposer,
        bytes32[] transactionIds
    );

    pub event SafeTransactionExecuted(
        bytes32 indexed safeTxHash,
        address indexed safe,
        address indexed executor,
        bytes32[] transactionIds
    );

    // Signature inferred by analogy with SafeTransactionQueued; spec.md names the event but
    // doesn't give its ABI (DESIGN.md Open Question).
    pub event GovernorProposalCreated(
        bytes32 indexed proposalId,
        address indexed governor,
        address indexed proposer,
        bytes32[] transactionIds
    );

    pub event Upgraded(address indexed implementation);
    pub event AdminChanged(address previousAdmin, address newAdmin);
    pub event BeaconUpgraded(address indexed beacon);
}
