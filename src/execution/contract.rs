//! ABI of the deployed executor contract and calldata builders for every
//! call the bot sends it.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::arb::rank::Strategy;
use crate::arb::route::Route;
use crate::guard::{ExecutionRequest, Role};

sol! {
    #[sol(rpc)]
    interface IFlashRouteExecutor {
        struct Hop {
            address pool;
            address tokenIn;
            address tokenOut;
        }

        function executeRoute(
            Hop[] calldata hops,
            uint256 amountIn,
            uint256 minAmountOut,
            bool useFlashLoan
        ) external returns (uint256 profit);

        function grantRole(bytes32 role, address account) external;
        function revokeRole(bytes32 role, address account) external;
        function setMaxGasPrice(uint256 maxGasPrice) external;
        function setTreasury(address treasury) external;
        function setFlashLender(address lender) external;

        error Unauthorized(address account, bytes32 role);
        error GasPriceTooHigh(uint256 gasPrice, uint256 maxGasPrice);
        error StaleQuote(uint256 quoted, uint256 minAmountOut);
        error InsufficientRepayment(uint256 owed, uint256 available);
    }
}

/// Hops of `route` as the contract expects them
#[must_use]
pub fn hops(route: &Route) -> Vec<IFlashRouteExecutor::Hop> {
    route
        .swaps()
        .iter()
        .map(|swap| IFlashRouteExecutor::Hop {
            pool: swap.pool_id().address(),
            tokenIn: swap.token_in().address(),
            tokenOut: swap.token_out().address(),
        })
        .collect()
}

/// `executeRoute` calldata for a request
#[must_use]
pub fn execute_route(request: &ExecutionRequest) -> Bytes {
    IFlashRouteExecutor::executeRouteCall {
        hops: hops(&request.route),
        amountIn: request.amount_in,
        minAmountOut: request.min_amount_out,
        useFlashLoan: request.strategy == Strategy::FlashLoan,
    }
    .abi_encode()
    .into()
}

/// `grantRole` calldata
#[must_use]
pub fn grant_role(role: Role, account: Address) -> Bytes {
    IFlashRouteExecutor::grantRoleCall {
        role: role.id(),
        account,
    }
    .abi_encode()
    .into()
}

/// `revokeRole` calldata
#[must_use]
pub fn revoke_role(role: Role, account: Address) -> Bytes {
    IFlashRouteExecutor::revokeRoleCall {
        role: role.id(),
        account,
    }
    .abi_encode()
    .into()
}

/// `setMaxGasPrice` calldata
#[must_use]
pub fn set_max_gas_price(max_gas_price_wei: u128) -> Bytes {
    IFlashRouteExecutor::setMaxGasPriceCall {
        maxGasPrice: U256::from(max_gas_price_wei),
    }
    .abi_encode()
    .into()
}

/// `setTreasury` calldata
#[must_use]
pub fn set_treasury(treasury: Address) -> Bytes {
    IFlashRouteExecutor::setTreasuryCall { treasury }
        .abi_encode()
        .into()
}

/// `setFlashLender` calldata
#[must_use]
pub fn set_flash_lender(lender: Address) -> Bytes {
    IFlashRouteExecutor::setFlashLenderCall { lender }
        .abi_encode()
        .into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use alloy::primitives::address;

    use super::*;
    use crate::arb::test_helpers::*;

    #[test]
    fn test_selectors() {
        let account = address!("00000000000000000000000000000000000000b2");
        assert_eq!(hex::encode(&grant_role(Role::Executor, account)[..4]), "2f2ff15d");
        assert_eq!(hex::encode(&revoke_role(Role::Executor, account)[..4]), "d547741f");
        assert_eq!(hex::encode(&set_max_gas_price(1)[..4]), "d2fa635e");
        assert_eq!(hex::encode(&set_treasury(account)[..4]), "f0f44260");
        assert_eq!(hex::encode(&set_flash_lender(account)[..4]), "8b188d9d");
    }

    #[test]
    fn test_execute_route_calldata() {
        let market = snapshot(&[("P1", "A", "B", 100, 200), ("P2", "B", "A", 300, 100)]);
        let request = ExecutionRequest {
            route: route(&market, &["P1", "P2"], "A"),
            strategy: Strategy::FlashLoan,
            amount_in: U256::from(20),
            min_amount_out: U256::from(27),
        };

        let calldata = execute_route(&request);
        assert_eq!(hex::encode(&calldata[..4]), "79524c03");

        let decoded = IFlashRouteExecutor::executeRouteCall::abi_decode(&calldata, true).unwrap();
        assert_eq!(decoded.hops.len(), 2);
        assert_eq!(decoded.hops[0].pool, pool_id("P1").address());
        assert_eq!(decoded.hops[0].tokenIn, token_id("A").address());
        assert_eq!(decoded.hops[1].tokenOut, token_id("A").address());
        assert_eq!(decoded.amountIn, U256::from(20));
        assert_eq!(decoded.minAmountOut, U256::from(27));
        assert!(decoded.useFlashLoan);
    }

    #[test]
    fn test_role_ids_match_contract() {
        let call = IFlashRouteExecutor::grantRoleCall::abi_decode(
            &grant_role(Role::Admin, Address::ZERO),
            true,
        )
        .unwrap();
        assert_eq!(call.role, Role::Admin.id());
    }
}
