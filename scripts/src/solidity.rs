//! Definitions of Solidity functions called during deployment

use alloy::sol;

sol! {
    function initialize() external;
}

sol! {
    #[sol(rpc)]
    interface IProxyAdmin {
        function upgradeAndCall(address proxy, address implementation, bytes memory data) external payable;
    }
}

sol! {
    /// The cross-chain message client each deployed contract inherits from
    #[sol(rpc)]
    interface IMessageClient {
        function configureClient(
            address _messageV3,
            uint256[] calldata _chains,
            address[] calldata _endpoints,
            uint16[] calldata _confirmations
        ) external;
    }
}
