//! Contract ABI definitions
//!
//! Uses alloy's sol! macro to generate type-safe call and event bindings for
//! the confidential metrics hub and the OP-stack contracts the bridge flow
//! touches. Calls are ABI-encoded here and sent through the wallet or the
//! rotating RPC client.

#![allow(clippy::too_many_arguments)]

use alloy::sol;

sol! {
    #![sol(all_derives)]

    /// Confidential metrics hub (settlement chain)
    interface IMetricsHub {
        event Recorded(uint32 indexed src, uint32 indexed dst, address indexed user, uint256 idx, bytes32 originTx);

        /// Append an encrypted amount to the caller's history for (src, dst)
        function record(uint32 srcChainId, uint32 dstChainId, bytes32 amountWeiExt, bytes inputProof, bytes32 originTxHash) external;

        /// Publish the aggregate snapshot once at least `kThreshold` records exist
        function publish(uint32 srcChainId, uint32 dstChainId, uint64 kThreshold) external;

        function getTotals(uint32 srcChainId, uint32 dstChainId) external view returns (bytes32 totalVolumeWei, bytes32 txCount);
        function getPublicSnapshots(uint32 srcChainId, uint32 dstChainId) external view returns (bytes32 publicVolumeWei, bytes32 publicCount);

        function myHistoryLength(uint32 srcChainId, uint32 dstChainId) external view returns (uint256 length);
        function getMyHistory(uint32 srcChainId, uint32 dstChainId, uint256 start, uint256 count) external view returns (bytes32[] amounts, uint64[] timestamps);

        function grantMyHistory(uint32 srcChainId, uint32 dstChainId, uint256[] idxs) external;
        function grantMyHistoryRange(uint32 srcChainId, uint32 dstChainId, uint256 start, uint256 endExclusive) external;
    }
}

sol! {
    #![sol(all_derives)]

    /// L1StandardBridge (settlement chain)
    interface IL1StandardBridge {
        function depositETH(uint32 minGasLimit, bytes extraData) external payable;
    }

    /// L2StandardBridge predeploy (rollup)
    interface IL2StandardBridge {
        function withdrawTo(address l2Token, address to, uint256 amount, uint32 minGasLimit, bytes extraData) external payable;
        function withdraw(address l2Token, uint256 amount, uint32 minGasLimit, bytes extraData) external payable;
    }

    /// L2ToL1MessagePasser predeploy (rollup)
    interface IL2ToL1MessagePasser {
        event MessagePassed(uint256 indexed nonce, address indexed sender, address indexed target, uint256 value, uint256 gasLimit, bytes data, bytes32 withdrawalHash);
    }

    struct WithdrawalTransaction {
        uint256 nonce;
        address sender;
        address target;
        uint256 value;
        uint256 gasLimit;
        bytes data;
    }

    struct OutputRootProof {
        bytes32 version;
        bytes32 stateRoot;
        bytes32 messagePasserStorageRoot;
        bytes32 latestBlockhash;
    }

    struct OutputProposal {
        bytes32 outputRoot;
        uint128 timestamp;
        uint128 l2BlockNumber;
    }

    /// OptimismPortal (settlement chain)
    interface IOptimismPortal {
        event WithdrawalProven(bytes32 indexed withdrawalHash, address indexed from, address indexed to);
        event WithdrawalFinalized(bytes32 indexed withdrawalHash, bool success);

        function proveWithdrawalTransaction(WithdrawalTransaction _tx, uint256 _l2OutputIndex, OutputRootProof _outputRootProof, bytes[] _withdrawalProof) external;
        function finalizeWithdrawalTransaction(WithdrawalTransaction _tx) external;

        function provenWithdrawals(bytes32 withdrawalHash) external view returns (bytes32 outputRoot, uint128 timestamp, uint128 l2OutputIndex);
        function finalizedWithdrawals(bytes32 withdrawalHash) external view returns (bool);
    }

    /// L2OutputOracle (settlement chain)
    interface IL2OutputOracle {
        function getL2OutputIndexAfter(uint256 l2BlockNumber) external view returns (uint256);
        function getL2Output(uint256 l2OutputIndex) external view returns (OutputProposal);
        function latestBlockNumber() external view returns (uint256);
        function finalizationPeriodSeconds() external view returns (uint256);
    }
}
